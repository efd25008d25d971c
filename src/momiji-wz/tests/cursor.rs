mod common;

use common::*;
use momiji_wz::{
    crypto::{WzKey, WzRegion},
    version_hash, WzError, WzReader,
};

fn reader<'a>(data: &'a [u8], key: &'a WzKey) -> WzReader<'a> {
    WzReader::new(data, key, 0, 0)
}

#[test]
fn compressed_int_single_byte_forms() {
    let key = plain_key();
    for value in [0, 1, -1, 55, 127, -127] {
        let data = compressed_int(value);
        assert_eq!(data.len(), 1);

        let mut r = reader(&data, &key);
        assert_eq!(r.read_compressed_int().unwrap(), value);
    }
}

#[test]
fn compressed_int_escape_form() {
    let key = plain_key();
    for value in [-128, 128, 80000, i32::MIN, i32::MAX] {
        let data = compressed_int(value);
        assert_eq!(data.len(), 5);

        let mut r = reader(&data, &key);
        assert_eq!(r.read_compressed_int().unwrap(), value);
    }
}

#[test]
fn ascii_string_golden_bytes() {
    // Hand-computed against the rolling mask with a zero keystream.
    let key = plain_key();
    let data = ascii_string("Property", &key);
    assert_eq!(
        data,
        [0xF8, 0xFA, 0xD9, 0xC3, 0xDD, 0xCB, 0xDD, 0xC4, 0xC8]
    );

    let mut r = reader(&data, &key);
    assert_eq!(r.read_wz_string(true).unwrap(), "Property");
}

#[test]
fn unicode_string_golden_bytes() {
    let key = plain_key();
    let data = unicode_string("Hi", &key);
    assert_eq!(data, [0x02, 0xE2, 0xAA, 0xC2, 0xAA]);

    let mut r = reader(&data, &key);
    assert_eq!(r.read_wz_string(true).unwrap(), "Hi");
}

#[test]
fn empty_string_is_a_single_byte() {
    let key = WzKey::derive(WzRegion::Gms);
    let data = [0x00];

    let mut r = reader(&data, &key);
    assert_eq!(r.read_wz_string(true).unwrap(), "");
    assert_eq!(r.position(), 1);
}

#[test]
fn encrypted_round_trips() {
    let key = WzKey::derive(WzRegion::Gms);
    let long = "a".repeat(200);

    for s in ["x", "Pig.img", "stand/0/origin", &long] {
        let data = ascii_string(s, &key);
        let mut r = reader(&data, &key);
        assert_eq!(r.read_wz_string(true).unwrap(), *s);
    }

    let wide = "\u{AC00}".repeat(150);
    for s in ["Hi", "\u{AC00}\u{B098}\u{B2E4}", &wide] {
        let data = unicode_string(s, &key);
        let mut r = reader(&data, &key);
        assert_eq!(r.read_wz_string(true).unwrap(), *s);
    }
}

#[test]
fn unencrypted_string_ignores_the_keystream() {
    let gms = WzKey::derive(WzRegion::Gms);

    // Encoded with a zero keystream, decoded with a real key present
    // but the encryption flag off.
    let data = ascii_string("canvas", &plain_key());
    let mut r = reader(&data, &gms);
    assert_eq!(r.read_wz_string(false).unwrap(), "canvas");
}

#[test]
fn latin1_high_bytes_survive() {
    let key = plain_key();

    // 0xE9 is `é` in Latin-1; the decoder maps bytes to code points.
    let mut data = vec![-1_i8 as u8];
    data.push(0xE9 ^ 0xAA);

    let mut r = reader(&data, &key);
    assert_eq!(r.read_wz_string(true).unwrap(), "\u{E9}");
}

#[test]
fn string_at_offset_restores_position() {
    let key = plain_key();

    let mut data = ascii_string("first", &key);
    let target = data.len() as u64;
    data.extend(ascii_string("second", &key));

    let mut r = reader(&data, &key);
    assert_eq!(r.read_string_at(target, true).unwrap(), "second");
    assert_eq!(r.position(), 0);
    assert_eq!(r.read_wz_string(true).unwrap(), "first");
}

#[test]
fn string_block_forms() {
    let key = plain_key();

    // Layout: [inline block] [referenced string] [reference block].
    let mut data = name_block("inline", &key);
    let target = data.len();
    data.extend(ascii_string("pooled", &key));
    let block_at = data.len();
    data.push(0x01);
    data.extend((target as i32).to_le_bytes());

    let mut r = reader(&data, &key);
    assert_eq!(r.read_string_block(0, true).unwrap(), "inline");

    r.seek(block_at as u64);
    assert_eq!(r.read_string_block(0, true).unwrap(), "pooled");
    assert_eq!(r.position(), data.len() as u64);
}

#[test]
fn string_block_unknown_tag_yields_empty() {
    let key = plain_key();
    let data = [0x42, 0xFF, 0xFF];

    let mut r = reader(&data, &key);
    assert_eq!(r.read_string_block(0, true).unwrap(), "");
    assert_eq!(r.position(), 1);
}

#[test]
fn offset_round_trip() {
    let key = plain_key();
    let file_start = 60;
    let hash = version_hash(95);

    let field_pos = 100_u32;
    let target = 0x0001_2345_u32;

    let mut data = vec![0; field_pos as usize];
    data.extend(encoded_offset(field_pos, target, file_start, hash));

    let mut r = WzReader::new(&data, &key, file_start, hash);
    r.seek(u64::from(field_pos));
    assert_eq!(r.read_offset().unwrap(), target);
    assert_eq!(r.position(), u64::from(field_pos) + 4);
}

#[test]
fn offset_depends_on_field_position() {
    let file_start = 60;
    let hash = version_hash(95);

    let a = encoded_offset(100, 0x1000, file_start, hash);
    let b = encoded_offset(104, 0x1000, file_start, hash);
    assert_ne!(a, b);
}

#[test]
fn truncated_reads_fail_cleanly() {
    let key = plain_key();
    let data = [0x05, b'a', b'b'];

    let mut r = reader(&data, &key);
    assert!(matches!(r.read_bytes(16), Err(WzError::Io(_))));

    // A corrupt length prefix must not take the process down with an
    // absurd allocation either.
    let huge = [0x80, 0xFF, 0xFF, 0xFF, 0x7F, 0x00];
    let mut r = reader(&huge, &key);
    let len = r.read_compressed_int().unwrap();
    assert!(matches!(r.read_bytes(len as usize), Err(WzError::Io(_))));
}
