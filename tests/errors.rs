//! Error handling: each failure kind, the diagnostic context chain on the
//! error text, and the report-once behavior of the decode entry point.

use rawcodec::error::take_reports;
use rawcodec::{
    CalcSpec, FieldSpec, PrimKind, RawCodec, RawError, RawFieldDescriptor, RawValue, TypeSpec,
};

fn prim(kind: PrimKind, desc: RawFieldDescriptor) -> TypeSpec {
    TypeSpec::Primitive { kind, desc }
}

fn int_field(bits: usize) -> TypeSpec {
    prim(PrimKind::Int, RawFieldDescriptor::new(bits))
}

#[test]
fn test_unbound_value_names_the_field() {
    let _ = take_reports();
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![
            FieldSpec::new("header", int_field(8)),
            FieldSpec::new("payload", int_field(8)),
        ],
    };
    let value = RawValue::Record(vec![RawValue::Int(1), RawValue::Unbound]);
    let err = RawCodec::new()
        .encode("Message", &spec, &value)
        .expect_err("unbound field must fail");
    assert!(matches!(err, RawError::UnboundValue { .. }));
    let text = err.to_string();
    assert!(text.contains("While RAW-encoding type 'Message'"), "{text}");
    assert!(text.contains("In field 'payload'"), "{text}");
}

#[test]
fn test_omitted_mandatory_field_is_unbound() {
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![FieldSpec::new("id", int_field(8))],
    };
    let value = RawValue::Record(vec![RawValue::Omit]);
    let err = RawCodec::new()
        .encode("Message", &spec, &value)
        .expect_err("omitting a mandatory field must fail");
    assert!(matches!(err, RawError::UnboundValue { .. }));
    assert!(err.to_string().contains("In field 'id'"));
}

#[test]
fn test_value_spec_mismatch_is_unsupported() {
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![FieldSpec::new("id", int_field(8))],
    };
    let err = RawCodec::new()
        .encode("Message", &spec, &RawValue::Int(1))
        .expect_err("a record spec cannot encode a bare integer");
    assert!(matches!(err, RawError::UnsupportedEncoding { .. }));
}

#[test]
fn test_calculated_field_requires_fixed_length() {
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![
            FieldSpec::new("len", int_field(0)).with_calc(CalcSpec::LengthTo {
                targets: vec![1],
                unit: Some(8),
                offset: 0,
            }),
            FieldSpec::new("body", int_field(8)),
        ],
    };
    let value = RawValue::Record(vec![RawValue::Int(0), RawValue::Int(1)]);
    let err = RawCodec::new()
        .encode("Message", &spec, &value)
        .expect_err("variable-width calculated field must fail");
    assert!(matches!(err, RawError::InvalidCalculatedField { .. }));
}

#[test]
fn test_truncated_input_is_incomplete_and_reported_once() {
    let _ = take_reports();
    let spec = int_field(16);
    let err = RawCodec::new()
        .decode("Message", &spec, &[0xAB])
        .expect_err("8 bits cannot satisfy a 16 bit field");
    assert!(matches!(err, RawError::IncompleteMessage { .. }));
    let reports = take_reports();
    assert_eq!(reports.len(), 1, "{reports:?}");
    assert!(reports[0].contains("While RAW-decoding type 'Message'"));
}

#[test]
fn test_length_field_exceeding_budget_is_length_error() {
    let _ = take_reports();
    // The length field claims 1 octet but the target needs 4; the budget
    // check fires before any bits of the target are read.
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![
            FieldSpec::new("len", int_field(8)).with_calc(CalcSpec::LengthTo {
                targets: vec![1],
                unit: Some(8),
                offset: 0,
            }),
            FieldSpec::new("body", prim(PrimKind::Octets, RawFieldDescriptor::new(32))),
        ],
    };
    let err = RawCodec::new()
        .decode("Message", &spec, &[0x01, 0xAA, 0xBB, 0xCC, 0xDD])
        .expect_err("declared length below the field width must fail");
    assert!(matches!(err, RawError::LengthError { .. }));
    assert_eq!(take_reports().len(), 1);
}

#[test]
fn test_successful_decode_reports_nothing() {
    let _ = take_reports();
    // Both union attempts run; the first fails silently, the second commits.
    let spec = TypeSpec::Union {
        desc: RawFieldDescriptor::new(0),
        variants: vec![
            FieldSpec::new("wide", int_field(16)),
            FieldSpec::new("narrow", int_field(8)),
        ],
    };
    let value = RawCodec::new()
        .decode("Choice", &spec, &[0x42])
        .expect("decode");
    assert_eq!(
        value,
        RawValue::Union {
            variant: 1,
            value: Box::new(RawValue::Int(0x42)),
        }
    );
    assert!(take_reports().is_empty());
}

#[test]
fn test_exhausted_union_reports_once_with_last_error() {
    let _ = take_reports();
    let spec = TypeSpec::Union {
        desc: RawFieldDescriptor::new(0),
        variants: vec![
            FieldSpec::new("a", int_field(16)),
            FieldSpec::new("b", int_field(24)),
        ],
    };
    let err = RawCodec::new()
        .decode("Choice", &spec, &[0x42])
        .expect_err("no variant fits in 8 bits");
    assert!(matches!(err, RawError::IncompleteMessage { .. }));
    assert_eq!(take_reports().len(), 1);
}

#[test]
fn test_bitstring_shorter_than_its_length_is_rejected() {
    // One byte of data cannot back a 16-bit bit string; encode must return
    // an error rather than read past the byte vector.
    let spec = prim(PrimKind::Bits, RawFieldDescriptor::new(0));
    let value = RawValue::Bits {
        data: vec![0xFF],
        len: 16,
    };
    let err = RawCodec::new()
        .encode("Message", &spec, &value)
        .expect_err("inconsistent bit string must fail");
    assert!(matches!(
        err,
        RawError::LengthError {
            needed: 16,
            available: 8,
            ..
        }
    ));
}

#[test]
fn test_widthless_integer_decode_needs_a_budget() {
    let spec = int_field(0);
    let err = RawCodec::new()
        .decode("Message", &spec, &[0x01, 0x02])
        .expect_err("no width and no length budget");
    assert!(matches!(err, RawError::UnsupportedEncoding { .. }));
    let _ = take_reports();
}

#[test]
fn test_widthless_union_variant_does_not_mask_later_ones() {
    // A variant with no decodable width must fail its attempt instead of
    // succeeding on zero bits and shadowing the sized variant.
    let spec = TypeSpec::Union {
        desc: RawFieldDescriptor::new(0),
        variants: vec![
            FieldSpec::new("open", int_field(0)),
            FieldSpec::new("byte", int_field(8)),
        ],
    };
    let value = RawCodec::new()
        .decode("Choice", &spec, &[0x42])
        .expect("decode");
    assert_eq!(
        value,
        RawValue::Union {
            variant: 1,
            value: Box::new(RawValue::Int(0x42)),
        }
    );
}

#[test]
fn test_error_context_unwinds_cleanly() {
    // A failed encode must not leave context entries behind for later calls.
    let spec = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![FieldSpec::new("id", int_field(8))],
    };
    let bad = RawValue::Record(vec![RawValue::Unbound]);
    let codec = RawCodec::new();
    let _ = codec.encode("First", &spec, &bad);
    let err = codec
        .encode("Second", &spec, &bad)
        .expect_err("still unbound");
    let text = err.to_string();
    assert!(!text.contains("First"), "{text}");
    assert!(text.contains("Second"), "{text}");
}
