use std::io::Error;
use std::io::Write;

#[inline]
pub fn write_vint(write: &mut dyn Write, mut value: u64) -> Result<u32, Error> {
    let mut count = 1;
    while (value & !0x7F) != 0 {
        write.write_all(&[((value & 0x7F) | 0x80) as u8])?;
        value >>= 7;
        count += 1;
    }
    write.write_all(&[(value as u8)])?;
    Result::Ok(count)
}

/// Reads vints out of a memory mapped region. Running off the end of the
/// slice or an overlong encoding yields `None`, which callers report as a
/// corrupt segment.
pub struct VintCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> VintCursor<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> VintCursor<'a> {
        VintCursor { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn read(&mut self) -> Option<u64> {
        let mut res = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            if shift > 63 {
                return None;
            }
            res |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Some(res);
            }
            shift += 7;
        }
    }
}

pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut buf = Vec::new();
    loop {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Segment names are `_` followed by the counter in base 36.
pub fn segment_name(counter: u64) -> String {
    format!("_{}", base36(counter))
}

pub fn del_file_name(segment: &str, del_gen: u64) -> String {
    format!("{}_{}.del", segment, base36(del_gen))
}

/// Splits a file name into the segment it belongs to and, for deletion
/// files, the deletion generation. Non-segment files give `None`.
pub fn parse_segment_file(file_name: &str) -> Option<(&str, Option<u64>)> {
    if !file_name.starts_with('_') {
        return None;
    }
    let end = file_name[1..].find(|c| c == '.' || c == '_')? + 1;
    let segment = &file_name[..end];
    if segment.len() < 2 {
        return None;
    }
    if file_name[end..].starts_with('_') {
        let gen = file_name[end + 1..].strip_suffix(".del")?;
        let gen = u64::from_str_radix(gen, 36).ok()?;
        Some((segment, Some(gen)))
    } else {
        Some((segment, None))
    }
}

#[cfg(test)]
mod tests {

    use super::parse_segment_file;
    use super::segment_name;
    use super::write_vint;
    use super::VintCursor;
    use proptest::prelude::*;
    use proptest::test_runner::Config;

    proptest! {
        #![proptest_config(Config::with_cases(1000))]
        #[test]
        fn cursor_reads_what_was_written(nums in proptest::collection::vec(any::<u64>(), 0..50)) {
            let mut buf = Vec::new();
            for n in &nums {
                write_vint(&mut buf, *n).unwrap();
            }
            let mut cursor = VintCursor::new(&buf, 0);
            for n in &nums {
                prop_assert_eq!(Some(*n), cursor.read());
            }
            prop_assert_eq!(None, cursor.read());
        }
    }

    #[test]
    fn truncated_vint_is_none() {
        let buf = [0x80u8, 0x80];
        assert_eq!(None, VintCursor::new(&buf, 0).read());
    }

    #[test]
    fn segment_names_are_base36() {
        assert_eq!("_0", segment_name(0));
        assert_eq!("_a", segment_name(10));
        assert_eq!("_10", segment_name(36));
    }

    #[test]
    fn parses_segment_files() {
        assert_eq!(Some(("_a", None)), parse_segment_file("_a.0.tid"));
        assert_eq!(Some(("_a", None)), parse_segment_file("_a.seg"));
        assert_eq!(Some(("_1z", Some(37))), parse_segment_file("_1z_11.del"));
        assert_eq!(None, parse_segment_file("segments"));
        assert_eq!(None, parse_segment_file("write.lock"));
        assert_eq!(None, parse_segment_file("_x_bad.dex"));
    }
}
