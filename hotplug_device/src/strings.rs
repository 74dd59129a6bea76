/// Decodes little endian UTF-16 bytes, replacing invalid sequences.
/// A trailing odd byte is reported as a replacement character.
pub fn from_utf16le_lossy(v: &[u8]) -> String {
    let units: Vec<u16> = v
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let mut result = String::from_utf16_lossy(&units);
    if v.len() % 2 != 0 {
        result.push('\u{FFFD}');
    }
    result
}

/// Decodes a NUL terminated `DEVPROP_TYPE_STRING` payload.
pub fn string_from_utf16le(v: &[u8]) -> Option<String> {
    let result = from_utf16le_lossy(v);
    result
        .split_once(char::from(0))
        .map(|(result, _)| result.to_string())
}

/// Splits a `REG_MULTI_SZ` style list of wide characters. The list ends at
/// the first empty string or at the end of the buffer.
pub fn split_multi_sz(list: &[u16]) -> Vec<String> {
    list.split(|&unit| unit == 0)
        .take_while(|item| !item.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Byte flavour of [`split_multi_sz`] for `DEVPROP_TYPE_STRING_LIST` payloads.
pub fn split_multi_sz_le(v: &[u8]) -> Vec<String> {
    let units: Vec<u16> = v
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    split_multi_sz(&units)
}

pub fn to_utf16le(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain([0])
        .flat_map(u16::to_le_bytes)
        .collect()
}

pub fn to_multi_sz_le<S: AsRef<str>>(values: &[S]) -> Vec<u8> {
    let mut data: Vec<u8> = values
        .iter()
        .flat_map(|value| to_utf16le(value.as_ref()))
        .collect();
    data.extend_from_slice(&[0, 0]);
    data
}
