//! Container/codec tables and output format negotiation.

/// The only still-image type the sequence capture produces.
pub const STILL_MIME_TYPE: &str = "image/png";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    Matroska,
    WebM,
    Ogg,
    Mp4,
    Mpeg,
    QuickTime,
}

impl Container {
    pub const ALL: [Container; 6] = [
        Container::Matroska,
        Container::WebM,
        Container::Ogg,
        Container::Mp4,
        Container::Mpeg,
        Container::QuickTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Container::Matroska => "Matroska",
            Container::WebM => "WebM",
            Container::Ogg => "Ogg",
            Container::Mp4 => "MPEG-4",
            Container::Mpeg => "MPEG-2",
            Container::QuickTime => "QuickTime",
        }
    }

    /// Subtype used in `video/<subtype>`.
    pub fn mime_subtype(self) -> &'static str {
        match self {
            Container::Matroska => "x-matroska",
            Container::WebM => "webm",
            Container::Ogg => "ogg",
            Container::Mp4 => "mp4",
            Container::Mpeg => "mpeg",
            Container::QuickTime => "quicktime",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Container::Matroska => "mkv",
            Container::WebM => "webm",
            Container::Ogg => "ogv",
            Container::Mp4 => "mp4",
            Container::Mpeg => "mpg",
            Container::QuickTime => "mov",
        }
    }

    pub fn from_mime_subtype(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.mime_subtype().eq_ignore_ascii_case(s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Av1,
    Vp9,
    Vp8,
    Hevc,
    H264,
    Theora,
}

impl Codec {
    /// Preference order used when listing formats.
    pub const ALL: [Codec; 6] = [
        Codec::Av1,
        Codec::Vp9,
        Codec::Vp8,
        Codec::Hevc,
        Codec::H264,
        Codec::Theora,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Codec::Av1 => "AV1",
            Codec::Vp9 => "VP9",
            Codec::Vp8 => "VP8",
            Codec::Hevc => "H.265",
            Codec::H264 => "H.264",
            Codec::Theora => "Theora",
        }
    }

    /// Spellings accepted in the `codecs=` parameter, most canonical first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Codec::Av1 => &["av1"],
            Codec::Vp9 => &["vp9", "vp9.0"],
            Codec::Vp8 => &["vp8", "vp8.0"],
            Codec::Hevc => &["hevc", "h265", "h.265"],
            Codec::H264 => &["avc1", "h264", "h.264"],
            Codec::Theora => &["theora", "ogg", "theo"],
        }
    }

    pub fn from_alias(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| {
            c.aliases()
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(s))
        })
    }
}

/// A parsed `video/<container>;codecs=<codec>` type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeType {
    pub container: Container,
    pub codec: Codec,
    raw: String,
}

impl MimeType {
    pub fn new(container: Container, codec_alias: &str) -> Option<Self> {
        let codec = Codec::from_alias(codec_alias)?;
        Some(Self {
            container,
            codec,
            raw: format!("video/{};codecs={codec_alias}", container.mime_subtype()),
        })
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (essence, params) = s.split_once(';')?;
        let subtype = essence.trim().strip_prefix("video/")?;
        let container = Container::from_mime_subtype(subtype)?;

        let codecs = params
            .split(';')
            .filter_map(|p| p.trim().split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("codecs"))
            .map(|(_, v)| v.trim().trim_matches('"'))?;
        let codec = Codec::from_alias(codecs)?;

        Some(Self {
            container,
            codec,
            raw: s.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One selectable output format.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct FormatOption {
    pub label: String,
    pub value: String,
}

/// Enumerate every codec x container combination the stream encoder accepts, followed by the
/// PNG sequence when still encoding is available.
///
/// For each pair the first alias that is supported wins, trying the lowercase spelling before
/// the uppercase one.
pub fn supported_formats(
    is_type_supported: impl Fn(&str) -> bool,
    still_available: bool,
) -> Vec<FormatOption> {
    let mut out = Vec::new();
    for codec in Codec::ALL {
        for container in Container::ALL {
            let found = codec.aliases().iter().find_map(|alias| {
                [alias.to_string(), alias.to_uppercase()]
                    .into_iter()
                    .map(|a| format!("video/{};codecs={a}", container.mime_subtype()))
                    .find(|mime| is_type_supported(mime))
            });
            if let Some(value) = found {
                out.push(FormatOption {
                    label: format!("{} + {}", container.label(), codec.label()),
                    value,
                });
            }
        }
    }
    if still_available {
        out.push(FormatOption {
            label: "PNG Sequence".to_owned(),
            value: STILL_MIME_TYPE.to_owned(),
        });
    }
    out
}
