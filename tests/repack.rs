mod common;

use common::*;
use daisydb::error::Error;
use daisydb::progress::NoProgress;
use daisydb::repack::engine::{RepackOptions, repack};
use std::fs;
use std::path::Path;

fn mini_tree() -> Vec<u8> {
    let dict = phoneme_dictionary(&["a", "i"]);

    let sta_part = tree_stationary_part(2, "C3");
    let sta_unit = tree_stationary_unit(&[sta_part], "a");
    let normal = tree_group(b"STA ", &[sta_unit], "normal");
    let stationary = tree_group(b"STA ", &[normal], "stationary");

    let art_part = tree_articulation_part(2, "C3");
    let art_unit = tree_articulation_unit(&[art_part], "i");
    let ph1 = tree_group(b"ART ", &[art_unit], "a");
    let articulation = tree_group(b"ART ", &[ph1], "articulation");

    let voice = tree_group(b"DBV ", &[stationary, articulation], "voice");
    root_tree(&[dict, voice])
}

fn write_dev_tree(dev_root: &Path, samples: &[i16], sta_frames: u32) {
    let sta_dir = dev_root.join("voice/stationary/normal/a");
    fs::create_dir_all(&sta_dir).unwrap();
    fs::write(
        sta_dir.join("C3"),
        dev_stationary_file(sta_frames, 4, 1, samples, "C3"),
    )
    .unwrap();

    let art_dir = dev_root.join("voice/articulation/a");
    fs::create_dir_all(&art_dir).unwrap();
    fs::write(
        art_dir.join("i"),
        dev_articulation_file(&[(2, 4, 1, samples.to_vec())], &["C3"], "a i"),
    )
    .unwrap();
}

#[test]
fn repack_writes_expected_bulk_file_and_patches() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("mini.tree");
    fs::write(&tree_path, mini_tree()).unwrap();

    let samples: Vec<i16> = (0..64).collect();
    write_dev_tree(dir.path(), &samples, 2);

    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let outcome = repack(
        &tree_path,
        dir.path(),
        &out,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap();

    // Frames of the in-use window, then the windowed sound chunk, for
    // the stationary leaf followed by the articulation leaf. With 64
    // samples over 4 frames and skip 1, the window covers everything.
    let mut expected = Vec::new();
    expected.extend_from_slice(&frame_chunk(1, 4));
    expected.extend_from_slice(&frame_chunk(2, 4));
    expected.extend_from_slice(&snd_chunk(44100, &samples));
    expected.extend_from_slice(&frame_chunk(0x41, 4));
    expected.extend_from_slice(&frame_chunk(0x42, 4));
    expected.extend_from_slice(&snd_chunk(44100, &samples));
    assert_eq!(fs::read(&outcome.ddb_path).unwrap(), expected);

    // The finalized index decodes, and the patched references point into
    // the new bulk file. Playback starts 16 samples in, so the stored
    // offsets sit 0x12 + 2*16 bytes past their blocks.
    let root = daisydb::load_index(&outcome.ddi_path).unwrap();
    let sta = root
        .find_path(&["voice", "stationary", "normal", "a", "C3"])
        .unwrap();
    let frames = sta.child_by_name("<Frames>").unwrap();
    assert_eq!(frames.prop_u64("Frame 00000").unwrap(), 0);
    assert_eq!(frames.prop_u64("Frame 00001").unwrap(), 12);
    assert_eq!(sta.prop_u64("SND Sample offset").unwrap(), 24 + 0x12 + 32);
    assert_eq!(sta.prop_u32("SND Sample count").unwrap(), 48);

    let art = root
        .find_path(&["voice", "articulation", "a", "i", "C3"])
        .unwrap();
    assert_eq!(art.prop_u64("SND Sample offset").unwrap(), 194 + 0x12);
    assert_eq!(
        art.prop_u64("SND Sample offset+800").unwrap(),
        194 + 0x12 + 32
    );
    assert_eq!(art.prop_u32("SND Sample count").unwrap(), 64);
}

#[test]
fn repack_is_deterministic_and_splices_the_digest() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("mini.tree");
    let tree = mini_tree();
    fs::write(&tree_path, &tree).unwrap();
    let samples: Vec<i16> = (0..64).map(|i| i * 3 - 50).collect();
    write_dev_tree(dir.path(), &samples, 2);

    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    fs::create_dir_all(&out_a).unwrap();
    fs::create_dir_all(&out_b).unwrap();
    let first = repack(
        &tree_path,
        dir.path(),
        &out_a,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap();
    let second = repack(
        &tree_path,
        dir.path(),
        &out_b,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap();

    assert_eq!(
        fs::read(&first.ddb_path).unwrap(),
        fs::read(&second.ddb_path).unwrap()
    );
    assert_eq!(first.digest, second.digest);
    assert_eq!(first.digest.len(), 32);
    assert!(first.digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

    // Splice layout: fixed 12-byte header, dictionary bytes, 260-byte
    // digest segment, then the remainder of the original index.
    let final_ddi = fs::read(&first.ddi_path).unwrap();
    assert_eq!(final_ddi.len(), tree.len() + 260);
    assert_eq!(&final_ddi[..12], b"\0\0\0\0\0\0\0\0DBSe");

    let dict_len = 16 + 4 + 2 * 31; // header, count, two phonetic units
    let dict_end = 16 + dict_len;
    assert_eq!(
        &final_ddi[dict_end..dict_end + 32],
        first.digest.as_bytes()
    );
    assert!(final_ddi[dict_end + 32..dict_end + 260].iter().all(|&b| b == 0));
}

#[test]
fn frame_count_mismatch_aborts_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("mini.tree");
    fs::write(&tree_path, mini_tree()).unwrap();

    let samples: Vec<i16> = (0..64).collect();
    // Tree records 2 frames; the loose file claims 3.
    write_dev_tree(dir.path(), &samples, 3);

    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let err = repack(
        &tree_path,
        dir.path(),
        &out,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Consistency(_)));
    assert!(!out.join("mini.ddb").exists());
    assert!(!out.join("mini.ddi").exists());
}

#[test]
fn articulation_part_count_must_match_pitch_segments() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("mini.tree");
    fs::write(&tree_path, mini_tree()).unwrap();

    let samples: Vec<i16> = (0..64).collect();
    write_dev_tree(dir.path(), &samples, 2);
    // Tree has one pitch segment under a-i; give the file two parts.
    fs::write(
        dir.path().join("voice/articulation/a/i"),
        dev_articulation_file(
            &[
                (2, 4, 1, samples.clone()),
                (2, 4, 1, samples.clone()),
            ],
            &["C3", "G3"],
            "a i",
        ),
    )
    .unwrap();

    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let err = repack(
        &tree_path,
        dir.path(),
        &out,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap_err();
    match err {
        Error::Consistency(msg) => assert!(msg.contains("2 parts")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn missing_loose_file_names_the_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let tree_path = dir.path().join("mini.tree");
    fs::write(&tree_path, mini_tree()).unwrap();

    let samples: Vec<i16> = (0..64).collect();
    write_dev_tree(dir.path(), &samples, 2);
    fs::remove_file(dir.path().join("voice/articulation/a/i")).unwrap();

    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let err = repack(
        &tree_path,
        dir.path(),
        &out,
        &RepackOptions::default(),
        &mut NoProgress,
    )
    .unwrap_err();
    match err {
        Error::Consistency(msg) => assert!(msg.contains("a-i")),
        other => panic!("unexpected: {other:?}"),
    }
}
