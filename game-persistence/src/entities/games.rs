use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "games")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub category_key: String,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_score: i32,
    pub player2_score: i32,
    pub player1_elo_before: i32,
    pub player2_elo_before: i32,
    pub player1_elo_after: Option<i32>,
    pub player2_elo_after: Option<i32>,
    pub winner_id: Option<Uuid>,
    pub is_ranked: bool,
    pub end_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
