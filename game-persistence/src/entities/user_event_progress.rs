use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_event_progress")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Uuid,
    pub category_key: String,
    pub event_name: String,
    pub ease_factor: f64,
    pub interval_days: i32,
    pub repetitions: i32,
    pub last_quality: i32,
    pub last_year_error: Option<i32>,
    pub last_distance_km: Option<f64>,
    pub next_review: DateTimeWithTimeZone,
    pub last_review: DateTimeWithTimeZone,
    pub total_attempts: i32,
    pub successful_attempts: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
