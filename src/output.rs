//! CSV出力
//!
//! 1ユニット・1ティックにつき1行の `SensorRecord` を書き出します。

use crate::models::{
    common::math_utils::round_to,
    sensor::SensorReading,
    unit::UnitSnapshot,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// タイムスタンプ列の書式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// CSVの1行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Ika_ID")]
    pub unit_id: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Altitude_m")]
    pub altitude_m: f64,
    #[serde(rename = "Target_Location")]
    pub target_location: String,
    #[serde(rename = "PM2.5_ug_m3")]
    pub pm25: f64,
    #[serde(rename = "PM10_ug_m3")]
    pub pm10: f64,
    #[serde(rename = "CO_ppm")]
    pub co: f64,
    #[serde(rename = "NO2_ppb")]
    pub no2: f64,
    #[serde(rename = "SO2_ppb")]
    pub so2: f64,
    #[serde(rename = "O3_ppb")]
    pub o3: f64,
    #[serde(rename = "VOC_ppb")]
    pub voc: f64,
    #[serde(rename = "Temperature_C")]
    pub temperature_c: f64,
    #[serde(rename = "Relative_Humidity_Percent")]
    pub humidity_pct: f64,
    #[serde(rename = "Sound_Level_dB")]
    pub sound_db: f64,
    #[serde(rename = "Light_Level_lux")]
    pub light_lux: f64,
    #[serde(rename = "Vibration_g")]
    pub vibration_g: f64,
    #[serde(rename = "Magnetic_Field_X_uT")]
    pub magnetic_x_ut: f64,
    #[serde(rename = "Magnetic_Field_Y_uT")]
    pub magnetic_y_ut: f64,
    #[serde(rename = "Magnetic_Field_Z_uT")]
    pub magnetic_z_ut: f64,
    #[serde(rename = "Radiation_uSv_h")]
    pub radiation_usv_h: f64,
}

impl SensorRecord {
    pub fn new(timestamp: NaiveDateTime, unit: &UnitSnapshot<'_>, reading: &SensorReading) -> Self {
        Self {
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            unit_id: unit.id.to_string(),
            latitude: round_to(unit.position.lat, 6),
            longitude: round_to(unit.position.lon, 6),
            altitude_m: round_to(unit.position.alt_m, 1),
            target_location: unit.target_name.to_string(),
            pm25: reading.pm25,
            pm10: reading.pm10,
            co: reading.co,
            no2: reading.no2,
            so2: reading.so2,
            o3: reading.o3,
            voc: reading.voc,
            temperature_c: reading.temperature_c,
            humidity_pct: reading.humidity_pct,
            sound_db: reading.sound_db,
            light_lux: reading.light_lux,
            vibration_g: reading.vibration_g,
            magnetic_x_ut: reading.magnetic_x_ut,
            magnetic_y_ut: reading.magnetic_y_ut,
            magnetic_z_ut: reading.magnetic_z_ut,
            radiation_usv_h: reading.radiation_usv_h,
        }
    }
}

/// `csv::Writer` のラッパー。ヘッダー行は最初のレコードで書き出されます。
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl RecordWriter<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
            rows: 0,
        })
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn write(&mut self, record: &SensorRecord) -> Result<(), csv::Error> {
        self.writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    /// 書き込んだ行数（ヘッダーを除く）
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> Result<W, csv::Error> {
        self.writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::{GeoPoint, GeoPosition};
    use chrono::NaiveDate;

    fn sample_record() -> SensorRecord {
        let timestamp = NaiveDate::from_ymd_opt(2023, 10, 28)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();
        let unit = UnitSnapshot {
            id: "IKA_001",
            position: GeoPosition::new(GeoPoint::new(39.920812345, 32.854198765), 1012.345),
            target_name: "Kizilay_Merkez",
        };
        let reading = SensorReading {
            pm25: 12.5,
            temperature_c: 14.2,
            ..SensorReading::default()
        };
        SensorRecord::new(timestamp, &unit, &reading)
    }

    #[test]
    fn test_record_rounding_and_timestamp() {
        let record = sample_record();
        assert_eq!(record.timestamp, "2023-10-28T07:05:00Z");
        assert_eq!(record.latitude, 39.920812);
        assert_eq!(record.longitude, 32.854199);
        assert_eq!(record.altitude_m, 1012.3);
    }

    #[test]
    fn test_header_and_rows() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write(&sample_record()).unwrap();
        writer.write(&sample_record()).unwrap();
        assert_eq!(writer.rows(), 2);

        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Timestamp,Ika_ID,Latitude,Longitude,Altitude_m,Target_Location,PM2.5_ug_m3"));
        assert!(lines[0].ends_with("Magnetic_Field_Z_uT,Radiation_uSv_h"));
        assert_eq!(lines[0].split(',').count(), 22);
        assert!(lines[1].starts_with("2023-10-28T07:05:00Z,IKA_001,39.920812,32.854199,1012.3,Kizilay_Merkez,12.5,"));
    }

    #[test]
    fn test_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut writer = RecordWriter::from_path(&path).unwrap();
        writer.write(&sample_record()).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
