use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "user_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    pub total_games: i32,
    pub wins: i32,
    pub losses: i32,
    pub total_score: i32,
    pub total_distance_error: f64,
    pub total_year_error: i32,
    pub total_rounds: i32,
    pub best_round_score: i32,
    pub best_game_score: i32,
    pub current_win_streak: i32,
    pub best_win_streak: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
