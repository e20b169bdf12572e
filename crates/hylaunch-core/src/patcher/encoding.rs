//! Fixed-width string substitution over raw bytes

/// Start offsets of every occurrence of `needle`, overlapping matches included
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(offset, _)| offset)
        .collect()
}

/// UTF-16LE encoding, as used for string literals in the native client
pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// Replace `old` with `new` in a UTF-16LE image, tolerating a mangled last char
///
/// The first N-1 characters must match as wide chars. For the last character
/// only its low byte is compared and overwritten; the byte after it is left
/// as found, since it is a terminator in plain wide strings and a metadata
/// byte in length-prefixed ones. Both domains must be ASCII of equal length.
pub fn replace_wide(data: &mut [u8], old: &str, new: &str) -> usize {
    debug_assert_eq!(old.len(), new.len());
    let (Some(old_last), Some(new_last)) = (old.bytes().last(), new.bytes().last()) else {
        return 0;
    };

    let old_head = utf16le(&old[..old.len() - 1]);
    let new_head = utf16le(&new[..new.len() - 1]);
    let mut count = 0;

    for offset in find_all(data, &old_head) {
        let last_pos = offset + old_head.len();
        if last_pos >= data.len() || data[last_pos] != old_last {
            continue;
        }

        data[offset..last_pos].copy_from_slice(&new_head);
        data[last_pos] = new_last;
        count += 1;

        match data.get(last_pos + 1) {
            Some(0) => log::debug!("Patched wide occurrence at offset {:#x}", offset),
            Some(meta) => log::debug!(
                "Patched length-prefixed occurrence at offset {:#x} (metadata {:#04x})",
                offset,
                meta
            ),
            None => log::debug!("Patched wide occurrence at end of image, offset {:#x}", offset),
        }
    }

    count
}

/// Exact same-length replacement of UTF-8 text
pub fn replace_utf8(data: &mut [u8], old: &str, new: &str) -> usize {
    debug_assert_eq!(old.len(), new.len());
    let positions = find_all(data, old.as_bytes());
    for &offset in &positions {
        data[offset..offset + new.len()].copy_from_slice(new.as_bytes());
        log::trace!("Patched UTF-8 occurrence at offset {:#x}", offset);
    }
    positions.len()
}
