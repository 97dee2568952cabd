use crate::models::common::math_utils::{chance, round_to, uniform, uniform_in};
use rand::{RngCore, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::trace;

/// 交通量に依存する汚染物質のプロファイル
///
/// 値 = U(base) × [場所係数 U(context_factor)] × [ラッシュ時係数 U(rush_factor)] を max で頭打ち。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PollutantProfile {
    pub base: [f64; 2],
    pub context_factor: [f64; 2],
    pub rush_factor: [f64; 2],
    pub max: f64,
    pub decimals: i32,
}

impl PollutantProfile {
    const fn new(base: [f64; 2], context_factor: [f64; 2], rush_factor: [f64; 2], max: f64, decimals: i32) -> Self {
        Self {
            base,
            context_factor,
            rush_factor,
            max,
            decimals,
        }
    }
}

/// 上限付きの一様分布プロファイル
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RangeProfile {
    pub range: [f64; 2],
    pub max: f64,
    pub decimals: i32,
}

/// 昼夜で範囲が変わるプロファイル（オゾン用）
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DayNightProfile {
    pub day_hours: [u32; 2],
    pub day: [f64; 2],
    pub night: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemperatureProfile {
    pub min_c: f64,
    pub max_c: f64,
    /// 日ごとのオフセット（0時に再抽選）
    pub daily_variation: [f64; 2],
    pub noise: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HumidityProfile {
    pub base: f64,
    /// 気温1℃あたりの低下量
    pub slope: f64,
    pub noise: f64,
    pub clamp: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SoundProfile {
    pub night: [f64; 2],
    pub day: [f64; 2],
    pub evening: [f64; 2],
    pub center_bonus: [f64; 2],
    /// 日中に加算される離散的な騒音イベント（dB）
    pub day_events: Vec<f64>,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LightProfile {
    pub day_peak: [f64; 2],
    pub day_offset: [f64; 2],
    pub night: [f64; 2],
    /// 夜間の人工光（lux）
    pub night_sources: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VibrationProfile {
    pub construction_chance: f64,
    pub construction: [f64; 2],
    pub traffic: [f64; 2],
    pub normal: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RadiationProfile {
    pub spike_chance: f64,
    pub spike: [f64; 2],
    pub normal: [f64; 2],
}

/// 異常値注入の設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnomalyProfile {
    /// 各測定値に異常が発生する確率
    pub chance: f64,
    pub multiplier: [f64; 2],
    /// 異常時に増幅（それ以外は減衰）する確率
    pub amplify_probability: f64,
}

/// 都市ごとの気候・環境プロファイル
///
/// 省略したフィールドはアンカラのプロファイルが使われます。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorProfile {
    pub pm25: PollutantProfile,
    pub pm10: PollutantProfile,
    pub co: PollutantProfile,
    pub no2: PollutantProfile,
    pub so2: RangeProfile,
    pub o3: DayNightProfile,
    pub voc: PollutantProfile,
    pub temperature: TemperatureProfile,
    pub humidity: HumidityProfile,
    pub sound: SoundProfile,
    pub light: LightProfile,
    pub vibration: VibrationProfile,
    pub magnetic_field: [f64; 2],
    pub radiation: RadiationProfile,
    pub anomaly: AnomalyProfile,
    /// 目標名に含まれると市街中心とみなすキーワード
    pub center_keywords: Vec<String>,
    /// 目標名に含まれると幹線道路沿いとみなすキーワード
    pub road_keywords: Vec<String>,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self {
            pm25: PollutantProfile::new([5.0, 25.0], [1.1, 1.3], [1.3, 2.0], 120.0, 2),
            pm10: PollutantProfile::new([10.0, 35.0], [1.1, 1.3], [1.3, 2.0], 150.0, 2),
            co: PollutantProfile::new([0.1, 1.5], [1.2, 1.6], [1.5, 2.5], 7.0, 2),
            no2: PollutantProfile::new([5.0, 20.0], [1.2, 1.5], [1.4, 2.2], 70.0, 1),
            so2: RangeProfile {
                range: [1.0, 15.0],
                max: 40.0,
                decimals: 1,
            },
            o3: DayNightProfile {
                day_hours: [10, 16],
                day: [30.0, 100.0],
                night: [10.0, 30.0],
            },
            voc: PollutantProfile::new([40.0, 300.0], [1.1, 1.4], [1.0, 1.0], 600.0, 0),
            temperature: TemperatureProfile {
                min_c: 8.0,
                max_c: 20.0,
                daily_variation: [-3.0, 3.0],
                noise: 1.0,
            },
            humidity: HumidityProfile {
                base: 70.0,
                slope: 1.5,
                noise: 10.0,
                clamp: [20.0, 85.0],
            },
            sound: SoundProfile {
                night: [25.0, 40.0],
                day: [50.0, 70.0],
                evening: [40.0, 55.0],
                center_bonus: [3.0, 10.0],
                day_events: vec![0.0],
                max: 90.0,
            },
            light: LightProfile {
                day_peak: [5000.0, 85000.0],
                day_offset: [0.0, 1000.0],
                night: [1.0, 80.0],
                night_sources: vec![0.0, 0.0, 0.0, 0.0, 150.0, 300.0],
            },
            vibration: VibrationProfile {
                construction_chance: 0.02,
                construction: [0.3, 1.5],
                traffic: [0.05, 0.3],
                normal: [0.01, 0.15],
            },
            magnetic_field: [-60.0, 60.0],
            radiation: RadiationProfile {
                spike_chance: 0.0001,
                spike: [0.31, 0.45],
                normal: [0.05, 0.30],
            },
            anomaly: AnomalyProfile {
                chance: 0.0005,
                multiplier: [2.0, 5.0],
                amplify_probability: 0.7,
            },
            center_keywords: vec!["Merkez".to_string(), "Kizilay".to_string()],
            road_keywords: vec!["Yolu".to_string()],
        }
    }
}

impl SensorProfile {
    /// 確率・範囲の検証
    pub fn validate(&self) -> Result<(), String> {
        let probabilities = [
            ("sensors.vibration.construction_chance", self.vibration.construction_chance),
            ("sensors.radiation.spike_chance", self.radiation.spike_chance),
            ("sensors.anomaly.chance", self.anomaly.chance),
            ("sensors.anomaly.amplify_probability", self.anomaly.amplify_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within [0, 1]: {}", name, value));
            }
        }
        if self.anomaly.multiplier[0] <= 0.0 {
            return Err("sensors.anomaly.multiplier must be positive".to_string());
        }
        if self.humidity.clamp[0] > self.humidity.clamp[1] {
            return Err("sensors.humidity.clamp must be [min, max]".to_string());
        }
        if self.temperature.min_c > self.temperature.max_c {
            return Err("sensors.temperature.min_c must not exceed max_c".to_string());
        }
        Ok(())
    }
}

/// 目標名から推定する場所の文脈
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocationContext {
    pub is_center: bool,
    pub is_road: bool,
}

impl LocationContext {
    pub fn from_hint(hint: &str, profile: &SensorProfile, roads_available: bool) -> Self {
        Self {
            is_center: profile.center_keywords.iter().any(|k| hint.contains(k.as_str())),
            is_road: roads_available && profile.road_keywords.iter().any(|k| hint.contains(k.as_str())),
        }
    }
}

/// 1ユニット・1ティック分のセンサー値
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub pm25: f64,
    pub pm10: f64,
    pub co: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub voc: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub sound_db: f64,
    pub light_lux: f64,
    pub vibration_g: f64,
    pub magnetic_x_ut: f64,
    pub magnetic_y_ut: f64,
    pub magnetic_z_ut: f64,
    pub radiation_usv_h: f64,
}

fn is_rush_hour(hour: u32) -> bool {
    (7..=9).contains(&hour) || (17..=19).contains(&hour)
}

/// センサー値合成器
///
/// 時刻と場所の文脈から物理的にもっともらしい値を生成し、
/// 低確率で異常値（増幅または減衰）を注入します。
#[derive(Debug, Clone)]
pub struct SensorSynthesizer {
    profile: SensorProfile,
    roads_available: bool,
    day_variation: f64,
    anomaly_count: u64,
}

impl SensorSynthesizer {
    pub fn new(profile: SensorProfile, roads_available: bool, rng: &mut dyn RngCore) -> Self {
        let day_variation = uniform_in(rng, profile.temperature.daily_variation);
        Self {
            profile,
            roads_available,
            day_variation,
            anomaly_count: 0,
        }
    }

    pub fn anomaly_count(&self) -> u64 {
        self.anomaly_count
    }

    pub fn day_variation(&self) -> f64 {
        self.day_variation
    }

    /// 毎時の先頭で呼び出す。0時に日ごとの気温オフセットを再抽選する
    pub fn begin_hour(&mut self, hour: u32, rng: &mut dyn RngCore) {
        if hour == 0 {
            self.day_variation = uniform_in(rng, self.profile.temperature.daily_variation);
        }
    }

    /// 全センサーの値を生成
    pub fn reading(&mut self, hour: u32, location_hint: &str, rng: &mut dyn RngCore) -> SensorReading {
        let context = LocationContext::from_hint(location_hint, &self.profile, self.roads_available);
        let temperature_c = self.temperature(hour, rng);
        SensorReading {
            humidity_pct: self.humidity(temperature_c, rng),
            pm25: self.pollutant(|p| &p.pm25, hour, context.is_center, rng),
            pm10: self.pollutant(|p| &p.pm10, hour, context.is_center, rng),
            co: self.pollutant(|p| &p.co, hour, context.is_road, rng),
            no2: self.pollutant(|p| &p.no2, hour, context.is_road, rng),
            so2: self.so2(rng),
            o3: self.o3(hour, rng),
            voc: self.voc(context, rng),
            temperature_c,
            sound_db: self.sound(hour, context.is_center, rng),
            light_lux: self.light(hour, rng),
            vibration_g: self.vibration(context.is_center, rng),
            magnetic_x_ut: self.magnetic_field(rng),
            magnetic_y_ut: self.magnetic_field(rng),
            magnetic_z_ut: self.magnetic_field(rng),
            radiation_usv_h: self.radiation(rng),
        }
    }

    /// 低確率で値を増幅または減衰させる
    fn maybe_anomaly(&mut self, value: f64, decimals: i32, rng: &mut dyn RngCore) -> f64 {
        let anomaly = &self.profile.anomaly;
        if !chance(rng, anomaly.chance) {
            return value;
        }
        let amplify = chance(rng, anomaly.amplify_probability);
        let multiplier = uniform_in(rng, anomaly.multiplier);
        self.anomaly_count += 1;
        let result = if amplify { value * multiplier } else { value / multiplier };
        trace!(original = value, anomalous = result, "異常値を注入しました");
        round_to(result, decimals)
    }

    fn pollutant(
        &mut self,
        select: fn(&SensorProfile) -> &PollutantProfile,
        hour: u32,
        in_context: bool,
        rng: &mut dyn RngCore,
    ) -> f64 {
        let profile = select(&self.profile);
        let decimals = profile.decimals;
        let mut value = uniform_in(rng, profile.base);
        if in_context {
            value *= uniform_in(rng, profile.context_factor);
        }
        if is_rush_hour(hour) {
            value *= uniform_in(rng, profile.rush_factor);
        }
        let value = round_to(value.min(profile.max), decimals);
        self.maybe_anomaly(value, decimals, rng)
    }

    fn so2(&mut self, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.so2;
        let decimals = profile.decimals;
        let value = round_to(uniform_in(rng, profile.range).min(profile.max), decimals);
        self.maybe_anomaly(value, decimals, rng)
    }

    fn o3(&mut self, hour: u32, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.o3;
        let [from, to] = profile.day_hours;
        let range = if (from..=to).contains(&hour) { profile.day } else { profile.night };
        let value = round_to(uniform_in(rng, range), 1);
        self.maybe_anomaly(value, 1, rng)
    }

    fn voc(&mut self, context: LocationContext, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.voc;
        let decimals = profile.decimals;
        let mut value = uniform_in(rng, profile.base);
        if context.is_road || context.is_center {
            value *= uniform_in(rng, profile.context_factor);
        }
        let value = round_to(value.min(profile.max), decimals);
        self.maybe_anomaly(value, decimals, rng)
    }

    /// 9時を位相の基準とする日周正弦波
    fn temperature(&mut self, hour: u32, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.temperature;
        let min = profile.min_c + self.day_variation;
        let max = profile.max_c + self.day_variation;
        let amplitude = (max - min) / 2.0;
        let average = min + amplitude;
        let value = average + amplitude * ((hour as f64 - 9.0) * (2.0 * PI / 24.0)).sin();
        let value = round_to(value + uniform(rng, -profile.noise, profile.noise), 1);
        self.maybe_anomaly(value, 1, rng)
    }

    fn humidity(&mut self, temperature_c: f64, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.humidity;
        let base = profile.base - temperature_c * profile.slope;
        let value = (base + uniform(rng, -profile.noise, profile.noise)).clamp(profile.clamp[0], profile.clamp[1]);
        self.maybe_anomaly(round_to(value, 1), 1, rng)
    }

    fn sound(&mut self, hour: u32, is_center: bool, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.sound;
        let mut value = if hour >= 23 || hour <= 6 {
            uniform_in(rng, profile.night)
        } else if (7..=19).contains(&hour) {
            uniform_in(rng, profile.day) + profile.day_events.choose(rng).copied().unwrap_or(0.0)
        } else {
            uniform_in(rng, profile.evening)
        };
        if is_center {
            value += uniform_in(rng, profile.center_bonus);
        }
        let value = round_to(value.min(profile.max), 1);
        self.maybe_anomaly(value, 1, rng)
    }

    /// 日中は sin²((h-6)π/13) で日照を近似し、夜間は人工光を加える
    fn light(&mut self, hour: u32, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.light;
        let value = if (7..=18).contains(&hour) {
            let sun = ((hour as f64 - 6.0) * PI / 13.0).sin().powi(2);
            uniform_in(rng, profile.day_peak) * sun + uniform_in(rng, profile.day_offset)
        } else {
            uniform_in(rng, profile.night) + profile.night_sources.choose(rng).copied().unwrap_or(0.0)
        };
        self.maybe_anomaly(value.round(), 0, rng)
    }

    fn vibration(&mut self, is_center: bool, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.vibration;
        let range = if chance(rng, profile.construction_chance) {
            profile.construction
        } else if is_center {
            profile.traffic
        } else {
            profile.normal
        };
        let value = round_to(uniform_in(rng, range), 2);
        self.maybe_anomaly(value, 2, rng)
    }

    fn magnetic_field(&mut self, rng: &mut dyn RngCore) -> f64 {
        let value = round_to(uniform_in(rng, self.profile.magnetic_field), 2);
        self.maybe_anomaly(value, 2, rng)
    }

    fn radiation(&mut self, rng: &mut dyn RngCore) -> f64 {
        let profile = &self.profile.radiation;
        let range = if chance(rng, profile.spike_chance) {
            profile.spike
        } else {
            profile.normal
        };
        let value = round_to(uniform_in(rng, range), 3);
        self.maybe_anomaly(value, 3, rng)
    }
}
