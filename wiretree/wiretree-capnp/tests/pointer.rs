use wiretree_capnp::{ElementSize, Pointer};

#[test]
fn null_word_decodes_to_null() {
    assert_eq!(Pointer::decode(0), Pointer::Null);
    assert_eq!(Pointer::Null.encode(), 0);
}

#[test]
fn struct_pointer_round_trips() {
    let p = Pointer::Struct {
        offset: 1,
        data_words: 2,
        pointer_words: 1,
    };
    assert_eq!(Pointer::decode(p.encode()), p);
}

#[test]
fn struct_pointer_negative_offset_round_trips() {
    let p = Pointer::Struct {
        offset: -3,
        data_words: 0,
        pointer_words: 4,
    };
    assert_eq!(Pointer::decode(p.encode()), p);
}

#[test]
fn struct_pointer_bit_layout() {
    let p = Pointer::Struct {
        offset: 1,
        data_words: 2,
        pointer_words: 3,
    };
    let word = p.encode();
    assert_eq!(word & 0x3, 0); // type bits
    assert_eq!((word >> 2) & 0x3FFF_FFFF, 1);
    assert_eq!((word >> 32) & 0xFFFF, 2);
    assert_eq!(word >> 48, 3);
}

#[test]
fn list_pointer_round_trips() {
    let p = Pointer::List {
        offset: 2,
        element_size: ElementSize::EightBytes,
        element_count: 10,
    };
    let word = p.encode();
    assert_eq!(word & 0x3, 1);
    assert_eq!((word >> 32) & 0x7, 5);
    assert_eq!(word >> 35, 10);
    assert_eq!(Pointer::decode(word), p);
}

#[test]
fn far_pointer_round_trips() {
    let p = Pointer::Far {
        double_far: false,
        word_offset: 7,
        segment_id: 3,
    };
    let word = p.encode();
    assert_eq!(word & 0x3, 2);
    assert_eq!(Pointer::decode(word), p);

    let double = Pointer::Far {
        double_far: true,
        word_offset: 1,
        segment_id: 1,
    };
    assert_eq!(Pointer::decode(double.encode()), double);
}

#[test]
fn capability_pointer_round_trips() {
    let p = Pointer::Capability { index: 42 };
    let word = p.encode();
    assert_eq!(word & 0x3, 3);
    assert_eq!(word >> 32, 42);
    assert_eq!(Pointer::decode(word), p);
}
