//! # Simulation モジュール
//!
//! 移動センサーユニット群の時間駆動シミュレーションを提供します。
//!
//! 1ティックは `records_per_hour` で決まる固定間隔（既定60件/時 = 1分）で、
//! 各ティックで全ユニットを順番に1回ずつ進め、ユニットごとに1行のセンサーレコードを出力します。
//!
//! ## 各ティックの処理順序
//!
//! 1. **時刻更新**: 0時ちょうどで気温の日変動を再抽選
//! 2. **ユニット処理**: 経路追従または到着後の再計画、境界射影、高度変動
//! 3. **センサー合成**: 時刻と目標名から環境値を生成
//! 4. **出力**: CSVへ1行書き込み
//!
//! 乱数は `SimulationContext` が保持する1本の `StdRng` だけを使うため、
//! 同じシードからは同じ出力が得られます。
//!
//! ## 使用例
//!
//! ```no_run
//! use ikasim::output::RecordWriter;
//! use ikasim::scenario::{CityPreset, ScenarioConfig};
//! use ikasim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::preset(CityPreset::Ankara)?;
//! let mut writer = RecordWriter::from_path(&config.output.path)?;
//!
//! let mut engine = SimulationEngine::new(config, 1)?;
//! engine.initialize()?;
//! let stats = engine.run(&mut writer)?;
//! println!("{} rows", stats.rows);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::models::{
    boundary::Boundary,
    common::ConfigError,
    key_location::KeyLocationTable,
    planner::build_planner,
    sensor::SensorSynthesizer,
    traits::{IAgent, IPathPlanner},
    unit::{MobileUnit, UnitConfig},
};
use crate::output::{RecordWriter, SensorRecord};
use crate::scenario::{ScenarioConfig, ScenarioError};
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info};

/// シミュレーション全体で共有する状態
///
/// 境界・重要地点・プランナーは構築後は読み取り専用で、乱数生成器だけが進みます。
pub struct SimulationContext {
    pub boundary: Boundary,
    pub key_locations: KeyLocationTable,
    pub planner: Box<dyn IPathPlanner>,
    pub unit_config: UnitConfig,
    pub rng: StdRng,
}

impl SimulationContext {
    pub fn new(
        boundary: Boundary,
        key_locations: KeyLocationTable,
        planner: Box<dyn IPathPlanner>,
        unit_config: UnitConfig,
        seed: u64,
    ) -> Self {
        Self {
            boundary,
            key_locations,
            planner,
            unit_config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// シナリオ設定から境界・重要地点・プランナーを構築
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self, SimulationError> {
        let boundary = scenario.city.boundary.build()?;
        let key_locations = KeyLocationTable::new(scenario.city.key_locations.clone(), &boundary);
        let road_config = scenario.road_network.clone().unwrap_or_default();
        let planner = build_planner(&scenario.planner, boundary, Some(&road_config))?;

        info!(
            city = %scenario.city.name,
            key_locations = key_locations.len(),
            roads = planner.road_network().map_or(0, |n| n.len()),
            rings = planner
                .road_network()
                .map_or(0, |n| n.roads().iter().filter(|r| r.is_ring()).count()),
            "シミュレーションコンテキストを構築しました"
        );

        Ok(Self::new(
            boundary,
            key_locations,
            planner,
            scenario.units.clone(),
            scenario.sim.seed,
        ))
    }
}

/// 1ティック分の時刻情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub index: u64,
    pub hour_of_day: u32,
    pub minute: u32,
    pub timestamp: NaiveDateTime,
}

/// 開始時刻から固定間隔でティックを生成するクロック
#[derive(Debug, Clone)]
pub struct SimulationClock {
    start: NaiveDateTime,
    interval_s: i64,
    total_ticks: u64,
    next_index: u64,
}

impl SimulationClock {
    pub fn new(start: NaiveDateTime, records_per_hour: u32, duration_hours: u32) -> Self {
        let interval_s = 3600 / records_per_hour.max(1) as i64;
        Self {
            start,
            interval_s,
            total_ticks: duration_hours as u64 * records_per_hour as u64,
            next_index: 0,
        }
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// index 番目のティック（時刻が表現範囲を超える場合は None）
    fn tick_at(&self, index: u64) -> Option<Tick> {
        let offset = i64::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.interval_s))
            .and_then(TimeDelta::try_seconds)?;
        let timestamp = self.start.checked_add_signed(offset)?;
        Some(Tick {
            index,
            hour_of_day: timestamp.hour(),
            minute: timestamp.minute(),
            timestamp,
        })
    }
}

impl Iterator for SimulationClock {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.next_index >= self.total_ticks {
            return None;
        }
        let tick = self.tick_at(self.next_index)?;
        self.next_index += 1;
        Some(tick)
    }
}

/// 実行結果の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub rows: u64,
    pub replans: u64,
    pub anomalies: u64,
}

pub struct SimulationEngine {
    pub context: SimulationContext,
    pub units: Vec<MobileUnit>,
    pub synthesizer: SensorSynthesizer,
    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
    pub tick_count: u64,
    rows: u64,
}

impl SimulationEngine {
    /// 設定を検証してからエンジンを構築
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Result<Self, SimulationError> {
        scenario.validate()?;
        let mut context = SimulationContext::from_scenario(&scenario)?;
        let roads_available = context.planner.road_network().is_some_and(|n| !n.is_empty());
        let synthesizer = SensorSynthesizer::new(scenario.sensors.clone(), roads_available, &mut context.rng);

        Ok(Self {
            context,
            units: Vec::new(),
            synthesizer,
            scenario_config: scenario,
            verbose_level,
            tick_count: 0,
            rows: 0,
        })
    }

    /// ユニットを生成して初期経路を計画
    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        let prefix = self.context.unit_config.id_prefix.clone();
        self.units = (1..=self.scenario_config.sim.unit_count)
            .map(|i| MobileUnit::new(format!("{}_{:03}", prefix, i), &mut self.context))
            .collect();

        if self.verbose_level > 0 {
            info!(
                units = self.units.len(),
                key_locations = self.context.key_locations.len(),
                "初期化完了"
            );
        }

        Ok(())
    }

    /// 全ティックを実行してレコードを書き出す
    pub fn run<W: Write>(&mut self, writer: &mut RecordWriter<W>) -> Result<RunStats, SimulationError> {
        if self.units.is_empty() {
            self.initialize()?;
        }

        let sim = &self.scenario_config.sim;
        let clock = SimulationClock::new(sim.start_time, sim.records_per_hour, sim.duration_hours);
        let total_ticks = clock.total_ticks();
        let progress_interval = sim.progress_interval_ticks;

        info!(total_ticks, units = self.units.len(), "=== シミュレーション実行開始 ===");

        for tick in clock {
            self.step(&tick, writer)?;

            if self.verbose_level > 0 && self.tick_count % progress_interval == 0 {
                let progress = self.tick_count as f64 / total_ticks as f64 * 100.0;
                info!(
                    timestamp = %tick.timestamp,
                    rows = self.rows,
                    "進行状況: {:.1}% ({}/{}ティック)",
                    progress,
                    self.tick_count,
                    total_ticks
                );
            }
        }
        writer.flush()?;

        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            rows = stats.rows,
            replans = stats.replans,
            anomalies = stats.anomalies,
            "=== シミュレーション完了 ==="
        );
        Ok(stats)
    }

    /// 1ティック分の処理
    pub fn step<W: Write>(&mut self, tick: &Tick, writer: &mut RecordWriter<W>) -> Result<(), SimulationError> {
        let records_per_hour = self.scenario_config.sim.records_per_hour as u64;
        if tick.index % records_per_hour == 0 {
            self.synthesizer.begin_hour(tick.hour_of_day, &mut self.context.rng);
            debug!(
                hour = tick.hour_of_day,
                day_variation = self.synthesizer.day_variation(),
                "時間帯を更新しました"
            );
        }

        for unit in &mut self.units {
            unit.tick(&mut self.context);
            let snapshot = unit.snapshot();
            let reading = self
                .synthesizer
                .reading(tick.hour_of_day, snapshot.target_name, &mut self.context.rng);
            writer.write(&SensorRecord::new(tick.timestamp, &snapshot, &reading))?;
            self.rows += 1;
        }

        self.tick_count += 1;
        Ok(())
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            ticks: self.tick_count,
            rows: self.rows,
            replans: self.units.iter().map(|u| u.replan_count()).sum(),
            anomalies: self.synthesizer.anomaly_count(),
        }
    }
}

/// シミュレーション実行エラー
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("設定エラー: {0}")]
    Config(#[from] ConfigError),
    #[error("CSV書き込みエラー: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),
}
