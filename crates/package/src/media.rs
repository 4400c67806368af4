/// Media type of a package resource, derived from its file extension.
pub fn media_type(path: impl AsRef<str>) -> Option<&'static str> {
    let (_, extension) = path.as_ref().rsplit_once('.')?;
    Some(match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "css" => "text/css",
        "otf" => "font/otf",
        "ttf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "xhtml" => "application/xhtml+xml",
        "ncx" => "application/x-dtbncx+xml",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("images/cover.jpg", Some("image/jpeg"))]
    #[case("images/cover.JPEG", Some("image/jpeg"))]
    #[case("images/logo.svg", Some("image/svg+xml"))]
    #[case("css/core.css", Some("text/css"))]
    #[case("fonts/body.woff2", Some("font/woff2"))]
    #[case("images/diagram.tiff", None)]
    #[case("images/noextension", None)]
    fn test_media_type(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(media_type(path), expected);
    }
}
