/// Prefix of the progress lines requested from yt-dlp via `--progress-template`.
pub const PROGRESS_PREFIX: &str = "progress:";
/// Prefix of the line yt-dlp prints once the final file is in place.
pub const SAVED_PREFIX: &str = "saved:";

/// Parses `progress: 42.1%` into `0.421`. Anything else is `None`.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let number = rest.trim().strip_suffix('%')?;
    let value = number.trim().parse::<f32>().ok()?;
    Some((value / 100.0).clamp(0.0, 1.0))
}

/// Parses `saved:/path/to/file.mp4` into the path part.
pub fn parse_saved_path(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(SAVED_PREFIX)
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_percentages() {
        assert_eq!(parse_progress_from_line("progress:  45.0%"), Some(0.45));
        assert_eq!(parse_progress_from_line("progress:100%"), Some(1.0));
        assert_eq!(parse_progress_from_line("progress: N/A"), None);
        assert_eq!(parse_progress_from_line("[download] 45.0%"), None);
    }

    #[test]
    fn parses_saved_path() {
        assert_eq!(parse_saved_path("saved:/tmp/a b.mp4\n"), Some("/tmp/a b.mp4"));
        assert_eq!(parse_saved_path("saved:"), None);
        assert_eq!(parse_saved_path("progress: 1%"), None);
    }
}
