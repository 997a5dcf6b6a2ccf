//! Media attachment models.

use serde::{Deserialize, Serialize};

/// What kind of media a file holds. Posts attach exactly one file, image or
/// video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Upload folder for post attachments.
    pub fn post_folder(&self) -> &'static str {
        match self {
            MediaKind::Image => "postImages",
            MediaKind::Video => "postVideos",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }
}

/// A post attachment is either a file picked on the device or a path
/// already stored in object storage. Explicit tagging replaces the
/// object-vs-string check the data model would otherwise need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    Local { uri: String, kind: MediaKind },
    Remote(String),
}

impl MediaSource {
    pub fn local(uri: impl Into<String>, kind: MediaKind) -> Self {
        Self::Local {
            uri: uri.into(),
            kind,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// A stored path only reveals its kind through the folder it was
    /// uploaded to.
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Local { kind, .. } => *kind,
            Self::Remote(path) => {
                if path.contains("postImages") {
                    MediaKind::Image
                } else {
                    MediaKind::Video
                }
            }
        }
    }
}

/// Where an avatar should be loaded from: a derived public URL, or the
/// bundled placeholder when the user never uploaded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarSource {
    Remote(String),
    Default,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_path_infers_kind_from_folder() {
        assert_eq!(
            MediaSource::Remote("postImages/1714650000000.png".to_string()).kind(),
            MediaKind::Image
        );
        assert_eq!(
            MediaSource::Remote("postVideos/1714650000000.mp4".to_string()).kind(),
            MediaKind::Video
        );
    }

    #[test]
    fn local_attachment_keeps_its_tag() {
        let file = MediaSource::local("file:///tmp/pick.png", MediaKind::Image);
        assert!(file.is_local());
        assert_eq!(file.kind(), MediaKind::Image);
    }
}
