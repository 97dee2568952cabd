//! # ikasim
//!
//! 都市内を移動するセンサーユニット（IKA）の合成データ生成シミュレーター。
//!
//! 円形または矩形の都市境界の中で、ユニットが重要地点や道路網に沿って移動し、
//! 1分ごとに位置と環境センサー値をCSVへ出力します。

pub mod logging;
pub mod models;
pub mod output;
pub mod scenario;
pub mod simulation;
