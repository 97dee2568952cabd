use crate::models::{
    common::{GeoPoint, GeoPosition},
    path::Path,
    road::RoadNetwork,
};
use crate::simulation::SimulationContext;
use rand::RngCore;

/// 全てのシミュレーションエージェントが実装する基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    fn tick(&mut self, context: &mut SimulationContext);
}

/// 移動可能なエージェントのインターフェース
pub trait IMovable {
    /// 現在位置の取得
    fn get_position(&self) -> GeoPosition;
}

/// 経路計画のインターフェース
pub trait IPathPlanner {
    /// start から end までの経路を計画
    ///
    /// 返される経路は常に2点以上で、全ての点が境界内にあります。
    fn plan(&self, start: GeoPoint, end: GeoPoint, rng: &mut dyn RngCore) -> Path;

    /// 道路網（持たないプランナーは None）
    fn road_network(&self) -> Option<&RoadNetwork>;
}
