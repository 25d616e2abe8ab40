use crate::cli::UploadArgs;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use keepsake_compress::cli::Preference;
use keepsake_config::Config;
use keepsake_upload::{BatchReport, MediaPath, UploadObserver, UploadSummary};
use std::path::Path;
use tracing::instrument;

/// Check the files exist, upload them, and hand back the report.
///
/// Files are only read once the batch admits them.
#[instrument(skip_all, fields(destination = %args.destination))]
pub async fn run(config: &Config, args: UploadArgs) -> Result<BatchReport<MediaPath>> {
    let preference = Preference::try_from(args.compress).or_raise(|| ErrorKind::Arguments)?;
    let mut config = config.clone();
    config.compression.codec = preference.resolve(config.compression.codec);
    let batch = config.upload_batch().or_raise(|| ErrorKind::Config)?;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = MediaPath::open(path, content_type(path))
            .await
            .or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        files.push(file);
    }
    tracing::info!(files = files.len(), codec = config.compression.codec.as_str(), "Starting upload");

    batch
        .upload_batch(&args.destination, files, args.concurrency, &mut LogObserver::default())
        .await
        .or_raise(|| ErrorKind::Upload)
}

/// MIME type from the file extension. Guests send photos, videos and voice memos.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Logs the batch summary whenever it moves.
#[derive(Default)]
struct LogObserver {
    last: Option<UploadSummary>,
}
impl UploadObserver for LogObserver {
    fn on_summary(&mut self, summary: &UploadSummary) {
        if self.last.as_ref() == Some(summary) {
            return;
        }
        tracing::info!(
            progress = summary.overall_progress,
            completed = summary.completed,
            failed = summary.failed,
            in_progress = summary.in_progress,
            waiting = summary.waiting,
            total = summary.total,
            "Upload progress"
        );
        self.last = Some(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_config::StorageSettings;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::time::Duration;

    #[rstest]
    #[case("IMG_0001.JPG", "image/jpeg")]
    #[case("first dance.mov", "video/quicktime")]
    #[case("toast.m4a", "audio/mp4")]
    #[case("photo.heic", "image/heic")]
    #[case("notes.txt", "application/octet-stream")]
    #[case("no-extension", "application/octet-stream")]
    fn test_content_type(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(content_type(Path::new(path)), expected);
    }

    fn local_config(root: &Path) -> Config {
        let mut config = Config {
            storage: StorageSettings::Local {
                root: root.to_path_buf(),
                base_url: Some("https://photos.example/media".to_string()),
            },
            ..Config::default()
        };
        config.upload.admission_pause = Duration::from_millis(5);
        config
    }

    fn args(destination: &str, files: Vec<PathBuf>, compress: Option<Option<String>>) -> UploadArgs {
        UploadArgs {
            destination: destination.to_string(),
            files,
            concurrency: None,
            compress,
        }
    }

    #[tokio::test]
    async fn test_uploads_to_local_storage() {
        let source = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let photo = source.path().join("Our First Kiss.JPG");
        let memo = source.path().join("toast.m4a");
        std::fs::write(&photo, vec![7u8; 2048]).unwrap();
        std::fs::write(&memo, b"voice memo").unwrap();

        let report = run(&local_config(storage.path()), args("smith-wedding", vec![photo, memo], None))
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.summary.completed, 2);
        assert_eq!(report.uploaded[0].name, "Our First Kiss.JPG");
        assert_eq!(report.uploaded[0].content_type, "image/jpeg");
        assert_eq!(report.uploaded[0].size, 2048);
        assert_eq!(report.uploaded[1].content_type, "audio/mp4");
        for media in &report.uploaded {
            assert!(media.url.starts_with("https://photos.example/media/smith-wedding/"));
        }
        assert_eq!(std::fs::read_dir(storage.path().join("smith-wedding")).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_bare_compress_flag_shrinks_uploads() {
        let source = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        // Over the 1 MB threshold and trivially compressible.
        let raw = source.path().join("scan.bin");
        std::fs::write(&raw, vec![0u8; 2 * 1024 * 1024]).unwrap();

        let report = run(&local_config(storage.path()), args("gallery", vec![raw], Some(None)))
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(report.uploaded[0].size < 2 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let storage = tempfile::tempdir().unwrap();
        let missing = storage.path().join("missing.jpg");
        let err = run(&local_config(storage.path()), args("gallery", vec![missing.clone()], None))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Read(path) if path == &missing));
    }

    #[tokio::test]
    async fn test_unknown_codec() {
        let storage = tempfile::tempdir().unwrap();
        let err = run(&local_config(storage.path()), args("gallery", vec![], Some(Some("lz4".to_string()))))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Arguments));
    }

    #[tokio::test]
    async fn test_bad_destination() {
        let source = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();
        let photo = source.path().join("a.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        let err = run(&local_config(storage.path()), args("  ", vec![photo], None))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Upload));
    }
}
