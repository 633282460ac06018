//! Tile service discovery on an asset page.
//!
//! Asset pages embed the image base URL and an initial token in a script
//! array, directly after a closing bracket:
//!
//! ```text
//! ...]
//! ,"//lh3.example.com/ci/AbCdEf","tok123"]...
//! ```
//!
//! The newline is optional and the token may be `null`. Strings may use the
//! `\/` and `\uXXXX` escapes.

use crate::error::{PipelineError, PipelineResult};

/// Location of an image on the tile service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageLocation {
    /// `https://host`
    pub origin: String,
    /// Absolute path of the image, e.g. `/ci/AbCdEf`.
    pub path: String,
    /// Initial token; empty when the page carries `null`.
    pub token: String,
}

impl ImageLocation {
    /// Full image URL (`{origin}{path}`).
    pub fn image_url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }

    /// URL of the pyramid descriptor (`{image_url}=g`).
    pub fn descriptor_url(&self) -> String {
        format!("{}=g", self.image_url())
    }
}

/// Finds the embedded tile service reference in an asset page.
///
/// # Errors
///
/// Returns [`PipelineError::Discovery`] if no occurrence of the literal is
/// found.
pub fn find_descriptor_url(page: &str, page_url: &str) -> PipelineResult<ImageLocation> {
    let mut rest = page;
    while let Some(pos) = rest.find(']') {
        rest = &rest[pos + 1..];
        if let Some(location) = match_literal(rest) {
            return Ok(location);
        }
    }

    Err(PipelineError::Discovery {
        url: page_url.to_string(),
        reason: "embedded tile service literal not present".to_string(),
    })
}

fn match_literal(input: &str) -> Option<ImageLocation> {
    let input = input
        .strip_prefix("\r\n")
        .or_else(|| input.strip_prefix('\n'))
        .unwrap_or(input);
    let input = input.strip_prefix(',')?;

    let (url, input) = read_string(input)?;
    let input = input.strip_prefix(',')?;
    let token = if input.starts_with("null") {
        String::new()
    } else {
        read_string(input)?.0
    };

    let host_path = url.strip_prefix("//")?;
    let slash = host_path.find('/')?;
    let (host, path) = host_path.split_at(slash);
    if host.is_empty() || path.len() < 2 {
        return None;
    }

    Some(ImageLocation {
        origin: format!("https://{}", host),
        path: path.to_string(),
        token,
    })
}

/// Reads a double-quoted string, returning its value and the remaining input.
fn read_string(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let mut value = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &body[i + 1..])),
            '\n' => return None,
            '\\' => match chars.next()?.1 {
                '/' => value.push('/'),
                '"' => value.push('"'),
                '\\' => value.push('\\'),
                'u' => {
                    let mut code = 0u32;
                    for _ in 0..4 {
                        code = code * 16 + chars.next()?.1.to_digit(16)?;
                    }
                    value.push(char::from_u32(code)?);
                }
                _ => return None,
            },
            c => value.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://arts.example.com/asset/x/abc";

    #[test]
    fn test_literal_with_newline() {
        let page = "<script>var d=[[1,2]\n,\"//lh3.example.com/ci/AbCdEf\",\"tok123\"]</script>";
        let location = find_descriptor_url(page, PAGE_URL).unwrap();

        assert_eq!(location.origin, "https://lh3.example.com");
        assert_eq!(location.path, "/ci/AbCdEf");
        assert_eq!(location.token, "tok123");
        assert_eq!(location.image_url(), "https://lh3.example.com/ci/AbCdEf");
        assert_eq!(
            location.descriptor_url(),
            "https://lh3.example.com/ci/AbCdEf=g"
        );
    }

    #[test]
    fn test_literal_without_newline_and_null_token() {
        let page = r#"x=[0],"//lh5.example.com/ci/Zz9",null,"#;
        let location = find_descriptor_url(page, PAGE_URL).unwrap();
        assert_eq!(location.path, "/ci/Zz9");
        assert_eq!(location.token, "");
    }

    #[test]
    fn test_crlf_and_escapes() {
        let page = "a]\r\n,\"\\/\\/lh3.example.com\\/ci\\/Q\\u002dR\",\"t\"";
        let location = find_descriptor_url(page, PAGE_URL).unwrap();
        assert_eq!(location.path, "/ci/Q-R");
    }

    #[test]
    fn test_skips_non_matching_brackets() {
        let page = r#"[1],"relative/path","t" [2],"//host.example.com/ci/Real","tok""#;
        let location = find_descriptor_url(page, PAGE_URL).unwrap();
        assert_eq!(location.origin, "https://host.example.com");
        assert_eq!(location.token, "tok");
    }

    #[test]
    fn test_absent_literal_is_discovery_error() {
        let err = find_descriptor_url("<html>no tiles here</html>", PAGE_URL).unwrap_err();
        assert!(matches!(err, PipelineError::Discovery { ref url, .. } if url == PAGE_URL));
    }

    #[test]
    fn test_host_without_path_is_rejected() {
        assert!(find_descriptor_url(r#"],"//host.example.com","t""#, PAGE_URL).is_err());
    }
}
