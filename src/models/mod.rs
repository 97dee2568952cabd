// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// 空間モデル: 境界・重要地点・道路網・経路
pub mod boundary;
pub mod key_location;
pub mod path;
pub mod road;

// 経路計画・移動ユニット・センサー合成
pub mod planner;
pub mod sensor;
pub mod unit;

// 便利な re-export
pub use boundary::Boundary;
pub use common::*;
pub use key_location::{KeyLocation, KeyLocationTable};
pub use path::Path;
pub use planner::{DirectPlanner, PlannerConfig, RoadNetworkPlanner, build_planner};
pub use road::{Road, RoadKind, RoadNetwork, RoadNetworkConfig};
pub use sensor::{SensorProfile, SensorReading, SensorSynthesizer};
pub use traits::*;
pub use unit::{MobileUnit, UnitConfig, UnitSnapshot};
