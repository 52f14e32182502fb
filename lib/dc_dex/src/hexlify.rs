use std::fmt::Write;

/// Lowercase hexadecimal rendering of a byte buffer.
#[must_use]
pub(crate) fn hexlify(arr: &[u8]) -> String {
    arr.iter().fold(String::with_capacity(arr.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexlify_test() {
        assert_eq!(hexlify(&[15, 60, 99]), String::from("0f3c63"));
        assert_eq!(hexlify(&[]), String::new());
    }
}
