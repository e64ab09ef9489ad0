//! Decode fuzz target: feed arbitrary bytes to the RAW decoder against a
//! schema exercising records, unions, repeating groups and length fields.
//! The decoder must not panic; it returns Ok(RawValue) or Err(RawError).
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
use rawcodec::{
    CalcSpec, ExtBit, FieldSpec, PrimKind, RawCodec, RawFieldDescriptor, TypeSpec,
};

#[cfg(fuzzing)]
fn fuzz_spec() -> TypeSpec {
    let prim = |kind, desc| TypeSpec::Primitive { kind, desc };
    let item = TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![
            FieldSpec::new("tag", prim(PrimKind::Int, RawFieldDescriptor::new(3))),
            FieldSpec::new("value", prim(PrimKind::Int, RawFieldDescriptor::new(13))),
        ],
    };
    let body = TypeSpec::Union {
        desc: RawFieldDescriptor::new(0),
        variants: vec![
            FieldSpec::new(
                "run",
                TypeSpec::SeqOf {
                    desc: RawFieldDescriptor::new(0).with_ext_bit(ExtBit::Yes),
                    elem: Box::new(item),
                },
            ),
            FieldSpec::new("word", prim(PrimKind::Int, RawFieldDescriptor::new(16))),
            FieldSpec::new("flag", prim(PrimKind::Bool, RawFieldDescriptor::new(1))),
        ],
    };
    TypeSpec::Record {
        desc: RawFieldDescriptor::new(0),
        fields: vec![
            FieldSpec::new("len", prim(PrimKind::Int, RawFieldDescriptor::new(8)))
                .with_calc(CalcSpec::LengthTo {
                    targets: vec![1],
                    unit: Some(8),
                    offset: 0,
                }),
            FieldSpec::new("payload", prim(PrimKind::Octets, RawFieldDescriptor::new(0))),
            FieldSpec::new("body", body),
        ],
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let codec = RawCodec::new();
    let spec = fuzz_spec();
    let _ = codec.decode("Fuzz", &spec, data);
    let _ = rawcodec::error::take_reports();
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
