use crate::models::{
    boundary::Boundary,
    common::{ConfigError, GeoPoint},
    key_location::KeyLocation,
    planner::PlannerConfig,
    road::RoadNetworkConfig,
    sensor::SensorProfile,
    unit::{StartStrategy, UnitConfig},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub unit_count: u32,
    pub duration_hours: u32,
    /// 1時間あたりの記録数（60なら1分刻み）
    pub records_per_hour: u32,
    /// 開始時刻（例: "2023-10-28T00:00:00"）
    pub start_time: NaiveDateTime,
    /// 進捗ログの間隔（ティック数）
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ticks: u64,
}

fn default_progress_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// 境界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryConfig {
    Circular {
        center: LatLon,
        radius_deg: f64,
    },
    Rectangular {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
}

impl BoundaryConfig {
    pub fn build(&self) -> Result<Boundary, ConfigError> {
        match *self {
            BoundaryConfig::Circular { center, radius_deg } => {
                Boundary::circular(GeoPoint::new(center.lat, center.lon), radius_deg)
            }
            BoundaryConfig::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => Boundary::rectangular(lat_min, lat_max, lon_min, lon_max),
        }
    }
}

/// 都市設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CityConfig {
    pub name: String,
    pub boundary: BoundaryConfig,
    #[serde(default)]
    pub key_locations: Vec<KeyLocation>,
}

/// 出力設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub city: CityConfig,
    #[serde(default)]
    pub road_network: Option<RoadNetworkConfig>,
    pub planner: PlannerConfig,
    #[serde(default)]
    pub units: UnitConfig,
    #[serde(default)]
    pub sensors: SensorProfile,
    pub output: OutputConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::Parse(path.display().to_string(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml(source: &str, origin: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(source).map_err(|e| ScenarioError::Parse(origin.to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 組み込みの都市プリセットを読み込み
    pub fn preset(city: CityPreset) -> Result<Self, ScenarioError> {
        Self::from_yaml(city.source(), city.name())
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.unit_count == 0 {
            return Err(ScenarioError::Validation("unit_count must be positive".to_string()));
        }
        if self.sim.duration_hours == 0 {
            return Err(ScenarioError::Validation("duration_hours must be positive".to_string()));
        }
        if self.sim.records_per_hour == 0 || 3600 % self.sim.records_per_hour != 0 {
            return Err(ScenarioError::Validation(format!(
                "records_per_hour must divide 3600: {}",
                self.sim.records_per_hour
            )));
        }
        if self.sim.progress_interval_ticks == 0 {
            return Err(ScenarioError::Validation("progress_interval_ticks must be positive".to_string()));
        }

        let boundary = self.city.boundary.build()?;
        for location in &self.city.key_locations {
            if !location.point().is_finite() {
                return Err(ConfigError::NonFiniteCoordinate(location.name.clone()).into());
            }
        }

        let units = &self.units;
        if units.altitude_m[0] > units.altitude_m[1] {
            return Err(ConfigError::InvalidRange {
                axis: "units.altitude_m",
                min: units.altitude_m[0],
                max: units.altitude_m[1],
            }
            .into());
        }
        if let Some([min, max]) = units.initial_altitude_m {
            if min > max {
                return Err(ConfigError::InvalidRange {
                    axis: "units.initial_altitude_m",
                    min,
                    max,
                }
                .into());
            }
        }
        if !(0.0..=1.0).contains(&units.key_target_probability) {
            return Err(ConfigError::InvalidProbability {
                name: "units.key_target_probability",
                value: units.key_target_probability,
            }
            .into());
        }
        if let StartStrategy::KeyLocation { jitter_deg } = units.start {
            if jitter_deg < 0.0 {
                return Err(ScenarioError::Validation("units.start.jitter_deg must not be negative".to_string()));
            }
        }

        self.planner.validate()?;
        if matches!(self.planner, PlannerConfig::RoadNetwork(_)) && !boundary.is_circular() {
            return Err(ConfigError::Invalid("road_network planner requires a circular boundary".to_string()).into());
        }

        self.sensors.validate().map_err(ScenarioError::Validation)?;

        Ok(())
    }

    /// 総ティック数
    pub fn total_ticks(&self) -> u64 {
        self.sim.duration_hours as u64 * self.sim.records_per_hour as u64
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ユニット数: {}", self.sim.unit_count);
        println!("期間: {}時間 ({}件/時)", self.sim.duration_hours, self.sim.records_per_hour);
        println!("開始時刻: {}", self.sim.start_time);
        println!("シード値: {}", self.sim.seed);
        println!("総レコード数: {}", self.total_ticks() * self.sim.unit_count as u64);
        println!();

        println!("=== 都市設定 ===");
        println!("都市: {}", self.city.name);
        match &self.city.boundary {
            BoundaryConfig::Circular { center, radius_deg } => {
                println!(
                    "境界: 円形 中心({:.4}, {:.4}) 半径 {:.3}度 (約{:.1}km)",
                    center.lat,
                    center.lon,
                    radius_deg,
                    radius_deg * 111.0
                );
            }
            BoundaryConfig::Rectangular {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => {
                println!("境界: 矩形 緯度[{:.2}, {:.2}] 経度[{:.2}, {:.2}]", lat_min, lat_max, lon_min, lon_max);
            }
        }
        println!("重要地点: {}箇所", self.city.key_locations.len());
        let planner = match self.planner {
            PlannerConfig::RoadNetwork(_) => "道路網",
            PlannerConfig::Direct(_) => "直線",
        };
        println!("経路計画: {}", planner);
        println!("出力先: {}", self.output.path.display());
    }
}

/// 組み込みの都市プリセット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CityPreset {
    Ankara,
    Aydin,
    Istanbul,
}

impl CityPreset {
    pub const ALL: [CityPreset; 3] = [CityPreset::Ankara, CityPreset::Aydin, CityPreset::Istanbul];

    pub fn name(&self) -> &'static str {
        match self {
            CityPreset::Ankara => "ankara",
            CityPreset::Aydin => "aydin",
            CityPreset::Istanbul => "istanbul",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            CityPreset::Ankara => include_str!("../scenarios/ankara.yaml"),
            CityPreset::Aydin => include_str!("../scenarios/aydin.yaml"),
            CityPreset::Istanbul => include_str!("../scenarios/istanbul.yaml"),
        }
    }
}

impl FromStr for CityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ankara" => Ok(CityPreset::Ankara),
            "aydin" | "aydın" => Ok(CityPreset::Aydin),
            "istanbul" => Ok(CityPreset::Istanbul),
            _ => Err(format!("無効な都市: {}. 利用可能: ankara, aydin, istanbul", s)),
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {0}: {1}")]
    Parse(String, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    Validation(String),
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_all_presets_load_and_validate() {
        for city in CityPreset::ALL {
            let config = ScenarioConfig::preset(city).unwrap();
            assert!(config.sim.unit_count > 0);
            assert!(!config.city.key_locations.is_empty());
        }
    }

    #[test]
    fn test_ankara_preset_values() {
        let config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        assert_eq!(config.city.key_locations.len(), 35);
        assert_eq!(config.total_ticks(), 24 * 60);
        assert!(matches!(config.planner, PlannerConfig::RoadNetwork(_)));
        match config.city.boundary {
            BoundaryConfig::Circular { center, radius_deg } => {
                assert_eq!(center.lat, 39.9208);
                assert_eq!(radius_deg, 0.10);
            }
            _ => panic!("ankara must be circular"),
        }
        assert_eq!(config.sensors, SensorProfile::default());
    }

    #[test]
    fn test_istanbul_preset_is_rectangular_direct() {
        let config = ScenarioConfig::preset(CityPreset::Istanbul).unwrap();
        assert!(matches!(config.city.boundary, BoundaryConfig::Rectangular { .. }));
        assert!(matches!(config.planner, PlannerConfig::Direct(_)));
        assert!(config.road_network.is_none());
        assert_eq!(config.sensors.anomaly.chance, 0.0);
        assert_eq!(config.units.initial_altitude_m, Some([20.0, 150.0]));
    }

    #[test]
    fn test_city_preset_from_str() {
        assert_eq!(CityPreset::from_str("Ankara"), Ok(CityPreset::Ankara));
        assert_eq!(CityPreset::from_str("aydin"), Ok(CityPreset::Aydin));
        assert!(CityPreset::from_str("izmir").is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let result = ScenarioConfig::from_file("does/not/exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_from_file_roundtrip_through_tempfile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CityPreset::Aydin.source().as_bytes()).unwrap();
        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.city.name, "Aydin");
    }

    #[test]
    fn test_validation_rejects_road_planner_on_rectangle() {
        let mut config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        config.city.boundary = BoundaryConfig::Rectangular {
            lat_min: 39.8,
            lat_max: 40.0,
            lon_min: 32.7,
            lon_max: 32.9,
        };
        assert!(matches!(config.validate(), Err(ScenarioError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        config.sim.unit_count = 0;
        assert!(matches!(config.validate(), Err(ScenarioError::Validation(_))));

        let mut config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        config.sim.records_per_hour = 7;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::preset(CityPreset::Istanbul).unwrap();
        config.units.initial_altitude_m = Some([150.0, 20.0]);
        assert!(matches!(config.validate(), Err(ScenarioError::Config(_))));

        let mut config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        config.units.key_target_probability = 1.5;
        assert!(matches!(config.validate(), Err(ScenarioError::Config(_))));

        let mut config = ScenarioConfig::preset(CityPreset::Ankara).unwrap();
        config.city.boundary = BoundaryConfig::Circular {
            center: LatLon { lat: 39.9, lon: 32.8 },
            radius_deg: 0.0,
        };
        assert!(matches!(
            config.validate(),
            Err(ScenarioError::Config(ConfigError::NonPositiveRadius(_)))
        ));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = ScenarioConfig::from_yaml("meta: [", "broken");
        assert!(matches!(result, Err(ScenarioError::Parse(_, _))));
    }
}
