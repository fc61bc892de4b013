//! Built-in control (envelope) schemas
//!
//! Each schema's main loop is `INTERCHANGE`, with `GROUP` and
//! `TRANSACTION` loops below it. Only header and trailer segments appear;
//! transaction bodies are governed by a separately bound schema.

use crate::model::{BaseType, ElementType, Reference, Schema, UNBOUNDED};
use crate::Result;

/// Id of the root loop of every control schema.
pub const INTERCHANGE: &str = "INTERCHANGE";
/// Id of the functional group loop.
pub const GROUP: &str = "GROUP";
/// Id of the transaction (message) loop.
pub const TRANSACTION: &str = "TRANSACTION";

fn req(id: &str) -> Reference {
    Reference::required(id)
}

fn opt(id: &str) -> Reference {
    Reference::optional(id)
}

fn an(id: &str, min: usize, max: usize) -> ElementType {
    ElementType::new(id, BaseType::String, min, max)
}

fn num(id: &str, min: usize, max: usize) -> ElementType {
    ElementType::new(id, BaseType::Numeric, min, max)
}

fn code(id: &str, min: usize, max: usize, values: &[&str]) -> ElementType {
    ElementType::new(id, BaseType::Identifier, min, max).with_values(values.iter().copied())
}

/// X12 envelope for interchange versions `00200` up to `00401`.
///
/// ISA11 is the interchange standards identifier (`U`).
///
/// # Errors
///
/// Propagates schema build errors; none are expected for this definition.
pub fn x12_00200() -> Result<Schema> {
    x12_envelope("X12.00200", code("I10", 1, 1, &["U"]))
}

/// X12 envelope for interchange versions `00402` and later.
///
/// ISA11 is the repetition separator.
///
/// # Errors
///
/// Propagates schema build errors; none are expected for this definition.
pub fn x12_00402() -> Result<Schema> {
    x12_envelope("X12.00402", an("I65", 1, 1))
}

fn x12_envelope(name: &str, isa11: ElementType) -> Result<Schema> {
    let isa11_id = isa11.id.clone();

    Schema::builder(name, INTERCHANGE)
        .loop_type(
            INTERCHANGE,
            vec![
                req("ISA"),
                Reference::new("TA1", 0, UNBOUNDED),
                Reference::new(GROUP, 0, UNBOUNDED),
                req("IEA"),
            ],
        )
        .loop_type(
            GROUP,
            vec![req("GS"), Reference::new(TRANSACTION, 1, UNBOUNDED), req("GE")],
        )
        .loop_type(TRANSACTION, vec![req("ST"), req("SE")])
        .segment(
            "ISA",
            vec![
                req("I01"),
                req("I02"),
                req("I03"),
                req("I04"),
                req("I05"),
                req("I06"),
                req("I05"),
                req("I07"),
                req("I08"),
                req("I09"),
                req(&isa11_id),
                req("I11"),
                req("I12"),
                req("I13"),
                req("I14"),
                req("I15"),
            ],
        )
        .segment(
            "TA1",
            vec![req("I12"), req("I08"), req("I09"), req("I17"), req("I18")],
        )
        .segment(
            "GS",
            vec![
                req("479"),
                req("142"),
                req("124"),
                req("373"),
                req("337"),
                req("28"),
                req("455"),
                req("480"),
            ],
        )
        .segment("ST", vec![req("143"), req("329"), opt("1705")])
        .segment("SE", vec![req("96"), req("329")])
        .segment("GE", vec![req("97"), req("28")])
        .segment("IEA", vec![req("I16"), req("I12")])
        .element(code("I01", 2, 2, &["00", "01", "02", "03", "04", "05", "06"]))
        .element(an("I02", 10, 10))
        .element(code("I03", 2, 2, &["00", "01"]))
        .element(an("I04", 10, 10))
        .element(code(
            "I05",
            2,
            2,
            &[
                "01", "02", "03", "04", "07", "08", "09", "10", "11", "12", "13", "14", "15", "16",
                "17", "18", "19", "20", "21", "22", "23", "24", "25", "26", "27", "28", "29", "30",
                "31", "32", "33", "34", "35", "36", "37", "38", "AM", "NR", "SA", "SN", "ZZ",
            ],
        ))
        .element(an("I06", 15, 15))
        .element(an("I07", 15, 15))
        .element(ElementType::new("I08", BaseType::Date, 6, 6))
        .element(ElementType::new("I09", BaseType::Time, 4, 4))
        .element(isa11)
        .element(code("I11", 5, 5, &[]))
        .element(num("I12", 9, 9))
        .element(code("I13", 1, 1, &["0", "1"]))
        .element(code("I14", 1, 1, &["I", "P", "T"]))
        .element(an("I15", 1, 1))
        .element(num("I16", 1, 5))
        .element(code("I17", 1, 1, &["A", "E", "R"]))
        .element(code("I18", 3, 3, &[]))
        .element(code("479", 2, 2, &[]))
        .element(an("142", 2, 15))
        .element(an("124", 2, 15))
        .element(ElementType::new("373", BaseType::Date, 8, 8))
        .element(ElementType::new("337", BaseType::Time, 4, 8))
        .element(num("28", 1, 9))
        .element(code("455", 1, 2, &["T", "X"]))
        .element(an("480", 1, 12))
        .element(code("143", 3, 3, &[]))
        .element(an("329", 4, 9))
        .element(an("1705", 1, 35))
        .element(num("96", 1, 10))
        .element(num("97", 1, 6))
        .build()
}

/// EDIFACT envelope for syntax version 3.
///
/// # Errors
///
/// Propagates schema build errors; none are expected for this definition.
pub fn edifact_v3() -> Result<Schema> {
    edifact_envelope("EDIFACT.3", 3)
}

/// EDIFACT envelope for syntax version 4.
///
/// # Errors
///
/// Propagates schema build errors; none are expected for this definition.
pub fn edifact_v4() -> Result<Schema> {
    edifact_envelope("EDIFACT.4", 4)
}

fn edifact_envelope(name: &str, syntax_version: u8) -> Result<Schema> {
    let date_max = if syntax_version >= 4 { 8 } else { 6 };

    let builder = Schema::builder(name, INTERCHANGE)
        .loop_type(
            INTERCHANGE,
            vec![
                req("UNB"),
                Reference::new(GROUP, 0, UNBOUNDED),
                Reference::new(TRANSACTION, 0, UNBOUNDED),
                req("UNZ"),
            ],
        )
        .loop_type(
            GROUP,
            vec![req("UNG"), Reference::new(TRANSACTION, 1, UNBOUNDED), req("UNE")],
        )
        .loop_type(TRANSACTION, vec![req("UNH"), req("UNT")])
        .segment(
            "UNB",
            vec![
                req("S001"),
                req("S002"),
                req("S003"),
                req("S004"),
                req("0020"),
                opt("S005"),
                opt("0026"),
                opt("0029"),
                opt("0031"),
                opt("0032"),
                opt("0035"),
            ],
        )
        .segment(
            "UNG",
            vec![
                opt("0038"),
                opt("S006"),
                opt("S007"),
                opt("S004"),
                req("0048"),
                opt("0051"),
                opt("S008"),
                opt("0058"),
            ],
        )
        .segment(
            "UNH",
            vec![req("0062"), req("S009"), opt("0068"), opt("S010")],
        )
        .segment("UNT", vec![req("0074"), req("0062")])
        .segment("UNE", vec![req("0060"), req("0048")])
        .segment("UNZ", vec![req("0036"), req("0020")])
        .composite(
            "S001",
            vec![req("0001"), req("0002"), opt("0080"), opt("0133")],
        )
        .composite(
            "S002",
            vec![req("0004"), opt("0007"), opt("0008"), opt("0042")],
        )
        .composite(
            "S003",
            vec![req("0010"), opt("0007"), opt("0014"), opt("0046")],
        )
        .composite("S004", vec![req("0017"), req("0019")])
        .composite("S005", vec![req("0022"), opt("0025")])
        .composite("S006", vec![req("0040"), opt("0007")])
        .composite("S007", vec![req("0044"), opt("0007")])
        .composite("S008", vec![req("0052"), opt("0054"), opt("0057")])
        .composite(
            "S009",
            vec![
                req("0065"),
                req("0052"),
                req("0054"),
                req("0051"),
                opt("0057"),
            ],
        )
        .composite("S010", vec![req("0070"), opt("0073")]);

    builder
        .element(an("0001", 4, 4))
        .element(num("0002", 1, 1))
        .element(an("0080", 1, 6))
        .element(an("0133", 1, 3))
        .element(an("0004", 1, 35))
        .element(an("0007", 1, 4))
        .element(an("0008", 1, 35))
        .element(an("0042", 1, 35))
        .element(an("0010", 1, 35))
        .element(an("0014", 1, 35))
        .element(an("0046", 1, 35))
        .element(ElementType::new("0017", BaseType::Date, 6, date_max))
        .element(ElementType::new("0019", BaseType::Time, 4, 4))
        .element(an("0020", 1, 14))
        .element(an("0022", 1, 14))
        .element(an("0025", 2, 2))
        .element(an("0026", 1, 14))
        .element(an("0029", 1, 1))
        .element(num("0031", 1, 1))
        .element(an("0032", 1, 35))
        .element(num("0035", 1, 1))
        .element(an("0038", 1, 6))
        .element(an("0040", 1, 35))
        .element(an("0044", 1, 35))
        .element(an("0048", 1, 14))
        .element(an("0051", 1, 3))
        .element(an("0052", 1, 3))
        .element(an("0054", 1, 3))
        .element(an("0057", 1, 6))
        .element(an("0058", 1, 14))
        .element(an("0062", 1, 14))
        .element(an("0065", 1, 6))
        .element(an("0068", 1, 35))
        .element(num("0070", 1, 2))
        .element(an("0073", 1, 1))
        .element(num("0074", 1, 10))
        .element(num("0060", 1, 6))
        .element(num("0036", 1, 6))
        .build()
}

/// Whether `tag` is a header or trailer segment of either dialect.
#[must_use]
pub fn is_control_tag(tag: &str) -> bool {
    matches!(
        tag,
        "ISA" | "IEA" | "GS" | "GE" | "ST" | "SE" | "TA1" | "UNB" | "UNZ" | "UNG" | "UNE" | "UNH"
            | "UNT"
    )
}
