use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "game_rounds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub game_id: Uuid,
    pub round_number: i32,
    pub event_name: String,
    pub event_lat: f64,
    pub event_lng: f64,
    pub event_year: i32,
    pub player1_guess_lat: Option<f64>,
    pub player1_guess_lng: Option<f64>,
    pub player1_guess_year: Option<i32>,
    pub player1_distance_km: Option<f64>,
    pub player1_year_error: Option<i32>,
    pub player1_time_left: Option<f64>,
    pub player1_score: Option<i32>,
    pub player2_guess_lat: Option<f64>,
    pub player2_guess_lng: Option<f64>,
    pub player2_guess_year: Option<i32>,
    pub player2_distance_km: Option<f64>,
    pub player2_year_error: Option<i32>,
    pub player2_time_left: Option<f64>,
    pub player2_score: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
