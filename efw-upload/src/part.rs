//! Multipart parts and `Content-Disposition` parsing.

use bytes::Bytes;
use percent_encoding::percent_decode_str;

/// One part of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadPart {
    content_disposition: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl UploadPart {
    /// Create a part from its `Content-Disposition` header and body.
    pub fn new(content_disposition: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            content_disposition: Some(content_disposition.into()),
            content_type: None,
            data: data.into(),
        }
    }

    /// A part without a `Content-Disposition` header.
    pub fn without_disposition(data: impl Into<Bytes>) -> Self {
        Self {
            content_disposition: None,
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the part's content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The raw `Content-Disposition` header.
    pub fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    /// The part's content type.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The form field name.
    pub fn name(&self) -> Option<String> {
        self.content_disposition
            .as_deref()
            .and_then(|cd| parameter(cd, "name"))
    }

    /// The client-supplied file name, if this part is a file.
    pub fn filename(&self) -> Option<String> {
        self.content_disposition.as_deref().and_then(filename)
    }

    /// The part body.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Body size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Extract the file name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987) wins over `filename`. Directory components some
/// browsers send are stripped. Returns `None` when there is no file name
/// or it is empty.
pub fn filename(content_disposition: &str) -> Option<String> {
    let raw = parameter(content_disposition, "filename*")
        .and_then(|v| decode_extended(&v))
        .or_else(|| parameter(content_disposition, "filename"))?;

    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw.as_str()).trim();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// Value of parameter `name` (case-insensitive), unquoted.
fn parameter(content_disposition: &str, name: &str) -> Option<String> {
    split_params(content_disposition)
        .into_iter()
        .skip(1)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| unquote(value.trim()))
        })
}

/// Split on `;` outside quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `charset'lang'percent-encoded`. Only UTF-8 and ISO-8859-1 are
/// understood.
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;

    let bytes = percent_decode(encoded)?;
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).ok()
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.into_iter().map(char::from).collect())
    } else {
        None
    }
}

/// Percent-decode, rejecting `%` not followed by two hex digits.
fn percent_decode(value: &str) -> Option<Vec<u8>> {
    let well_formed = value.split('%').skip(1).all(|escape| {
        escape
            .as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    well_formed.then(|| percent_decode_str(value).collect())
}
