pub mod entities;
pub mod numeric;

/// Byte ranges of maximal ASCII digit runs in `text`
pub(crate) fn digit_runs(text: &str) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, b) in text.bytes().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, text.len()));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_runs() {
        let text = "电话0571-88886666，手机13812345678";
        let runs: Vec<&str> = digit_runs(text).into_iter().map(|(s, e)| &text[s..e]).collect();
        assert_eq!(runs, vec!["0571", "88886666", "13812345678"]);
        assert!(digit_runs("无数字").is_empty());
    }
}
