use chrono::NaiveTime;
use rollcall_core::{scorer, ScorePolicy};
use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration: defaults, overlaid by an optional TOML file
/// (`ROLLCALL_CONFIG`), overlaid by `ROLLCALL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Minimum detection confidence for an enrollment capture to qualify.
    pub confidence_threshold: f32,
    /// Maximum template distance for a gallery match.
    pub match_tolerance: f32,
    /// Official start of the working day.
    pub work_start: NaiveTime,
    /// Grace period after work start, in minutes.
    pub allowed_delay_minutes: i64,
    /// Score deduction per late recognition.
    pub late_penalty: f64,
    /// Expected number of captures per enrollment burst.
    pub images_per_enroll: usize,
    /// Timeout in seconds for one engine operation (encoder inference).
    pub engine_timeout_secs: u64,
}

/// TOML file shape; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    db_path: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    match_tolerance: Option<f32>,
    work_start: Option<String>,
    allowed_delay_minutes: Option<i64>,
    late_penalty: Option<f64>,
    images_per_enroll: Option<usize>,
    engine_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Self {
        let file = load_file_config();

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .ok()
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join("attendance.db"));

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .ok()
            .or(file.model_dir)
            .unwrap_or_else(|| PathBuf::from("/usr/share/rollcall/models"));

        let work_start = std::env::var("ROLLCALL_WORK_START")
            .ok()
            .or(file.work_start)
            .and_then(|s| parse_work_start(&s))
            .unwrap_or_else(default_work_start);

        Self {
            db_path,
            model_dir,
            confidence_threshold: env_f32("ROLLCALL_CONFIDENCE_THRESHOLD")
                .or(file.confidence_threshold)
                .unwrap_or(0.90),
            match_tolerance: env_f32("ROLLCALL_MATCH_TOLERANCE")
                .or(file.match_tolerance)
                .unwrap_or(0.5),
            work_start,
            allowed_delay_minutes: env_i64("ROLLCALL_ALLOWED_DELAY_MINUTES")
                .or(file.allowed_delay_minutes)
                .unwrap_or(scorer::DEFAULT_ALLOWED_DELAY_MINUTES),
            late_penalty: env_f64("ROLLCALL_LATE_PENALTY")
                .or(file.late_penalty)
                .unwrap_or(scorer::DEFAULT_LATE_PENALTY),
            images_per_enroll: env_usize("ROLLCALL_IMAGES_PER_ENROLL")
                .or(file.images_per_enroll)
                .unwrap_or(5),
            engine_timeout_secs: env_u64("ROLLCALL_ENGINE_TIMEOUT_SECS")
                .or(file.engine_timeout_secs)
                .unwrap_or(10),
        }
    }

    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("face_detector.onnx")
            .to_string_lossy()
            .into_owned()
    }

    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("face_embedder.onnx")
            .to_string_lossy()
            .into_owned()
    }

    pub fn score_policy(&self) -> ScorePolicy {
        ScorePolicy {
            work_start: self.work_start,
            allowed_delay_minutes: self.allowed_delay_minutes,
            late_penalty: self.late_penalty,
        }
    }
}

fn load_file_config() -> FileConfig {
    let Ok(path) = std::env::var("ROLLCALL_CONFIG") else {
        return FileConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(cfg) => {
                tracing::info!(path, "loaded config file");
                cfg
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "ignoring unparsable config file");
                FileConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(path, error = %e, "ignoring unreadable config file");
            FileConfig::default()
        }
    }
}

fn parse_work_start(s: &str) -> Option<NaiveTime> {
    match NaiveTime::parse_from_str(s, "%H:%M:%S") {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(value = s, error = %e, "invalid work_start, using default");
            None
        }
    }
}

fn default_work_start() -> NaiveTime {
    NaiveTime::parse_from_str(scorer::DEFAULT_WORK_START, "%H:%M:%S")
        .expect("valid default work start")
}

fn env_f32(key: &str) -> Option<f32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
