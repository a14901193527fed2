use std::path::{Path, PathBuf};

/// Escape a phoneme or pitch name into a filesystem-safe path component.
/// Anything outside a conservative allowed set is written as `%XX`, and
/// `%` itself is always escaped so decoding stays unambiguous.
pub fn encode_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for &b in name.as_bytes() {
        let safe = b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b' ');
        if safe {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Loose-file path of a stationary pitch segment.
pub fn stationary_path(dev_root: &Path, color: &str, phoneme: &str, pitch: &str) -> PathBuf {
    dev_root
        .join("voice")
        .join("stationary")
        .join(color)
        .join(encode_component(phoneme))
        .join(encode_component(pitch))
}

/// Loose-file path of an articulation unit (two phonemes, or three for a
/// triphoneme).
pub fn articulation_path(dev_root: &Path, phonemes: &[&str]) -> PathBuf {
    let mut path = dev_root.join("voice").join("articulation");
    for ph in phonemes {
        path = path.join(encode_component(ph));
    }
    path
}

/// Articulation files occasionally carry a `.part` suffix; accept either.
pub fn with_part_fallback(path: PathBuf) -> Option<PathBuf> {
    if path.exists() {
        return Some(path);
    }
    let mut named = path.into_os_string();
    named.push(".part");
    let fallback = PathBuf::from(named);
    fallback.exists().then_some(fallback)
}
