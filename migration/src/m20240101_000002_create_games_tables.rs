use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Games::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Games::CategoryKey).string().not_null())
                    .col(ColumnDef::new(Games::Player1Id).string().not_null())
                    .col(ColumnDef::new(Games::Player2Id).string().not_null())
                    .col(
                        ColumnDef::new(Games::Player1Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Games::Player2Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Games::Player1EloBefore).integer().not_null())
                    .col(ColumnDef::new(Games::Player2EloBefore).integer().not_null())
                    .col(ColumnDef::new(Games::Player1EloAfter).integer())
                    .col(ColumnDef::new(Games::Player2EloAfter).integer())
                    .col(ColumnDef::new(Games::WinnerId).string())
                    .col(
                        ColumnDef::new(Games::IsRanked)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Games::EndReason).string())
                    .col(
                        ColumnDef::new(Games::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Games::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_games_player1")
                    .table(Games::Table)
                    .col(Games::Player1Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_games_player2")
                    .table(Games::Table)
                    .col(Games::Player2Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GameRounds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameRounds::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GameRounds::GameId).string().not_null())
                    .col(ColumnDef::new(GameRounds::RoundNumber).integer().not_null())
                    .col(ColumnDef::new(GameRounds::EventName).string().not_null())
                    .col(ColumnDef::new(GameRounds::EventLat).double().not_null())
                    .col(ColumnDef::new(GameRounds::EventLng).double().not_null())
                    .col(ColumnDef::new(GameRounds::EventYear).integer().not_null())
                    .col(ColumnDef::new(GameRounds::Player1GuessLat).double())
                    .col(ColumnDef::new(GameRounds::Player1GuessLng).double())
                    .col(ColumnDef::new(GameRounds::Player1GuessYear).integer())
                    .col(ColumnDef::new(GameRounds::Player1DistanceKm).double())
                    .col(ColumnDef::new(GameRounds::Player1YearError).integer())
                    .col(ColumnDef::new(GameRounds::Player1TimeLeft).double())
                    .col(ColumnDef::new(GameRounds::Player1Score).integer())
                    .col(ColumnDef::new(GameRounds::Player2GuessLat).double())
                    .col(ColumnDef::new(GameRounds::Player2GuessLng).double())
                    .col(ColumnDef::new(GameRounds::Player2GuessYear).integer())
                    .col(ColumnDef::new(GameRounds::Player2DistanceKm).double())
                    .col(ColumnDef::new(GameRounds::Player2YearError).integer())
                    .col(ColumnDef::new(GameRounds::Player2TimeLeft).double())
                    .col(ColumnDef::new(GameRounds::Player2Score).integer())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_game_rounds_game_id")
                    .table(GameRounds::Table)
                    .col(GameRounds::GameId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GameRounds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Games {
    Table,
    Id,
    CategoryKey,
    Player1Id,
    Player2Id,
    Player1Score,
    Player2Score,
    Player1EloBefore,
    Player2EloBefore,
    Player1EloAfter,
    Player2EloAfter,
    WinnerId,
    IsRanked,
    EndReason,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum GameRounds {
    Table,
    Id,
    GameId,
    RoundNumber,
    EventName,
    EventLat,
    EventLng,
    EventYear,
    Player1GuessLat,
    Player1GuessLng,
    Player1GuessYear,
    Player1DistanceKm,
    Player1YearError,
    Player1TimeLeft,
    Player1Score,
    Player2GuessLat,
    Player2GuessLng,
    Player2GuessYear,
    Player2DistanceKm,
    Player2YearError,
    Player2TimeLeft,
    Player2Score,
}
