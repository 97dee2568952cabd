use crate::models::common::GeoPoint;

/// 始点から終点までの有限な経路
///
/// 計画時に一度だけ構築され、以降は変更されません。
/// ユニットはカーソルを進めて消費し、再計画時には丸ごと置き換えます。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    points: Vec<GeoPoint>,
}

impl Path {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 点が1つ以下の経路は追従できない
    pub fn is_degenerate(&self) -> bool {
        self.points.len() <= 1
    }

    pub fn get(&self, index: usize) -> Option<GeoPoint> {
        self.points.get(index).copied()
    }

    pub fn first(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }
}
