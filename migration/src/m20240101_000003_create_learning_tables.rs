use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserStats::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserStats::TotalGames)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::Wins)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::Losses)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::TotalScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::TotalDistanceError)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(UserStats::TotalYearError)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::TotalRounds)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::BestRoundScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::BestGameScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::CurrentWinStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::BestWinStreak)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserEventProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserEventProgress::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserEventProgress::UserId).string().not_null())
                    .col(
                        ColumnDef::new(UserEventProgress::CategoryKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::EventName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::EaseFactor)
                            .double()
                            .not_null()
                            .default(2.5),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::IntervalDays)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::Repetitions)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::LastQuality)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UserEventProgress::LastYearError).integer())
                    .col(ColumnDef::new(UserEventProgress::LastDistanceKm).double())
                    .col(
                        ColumnDef::new(UserEventProgress::NextReview)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::LastReview)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::TotalAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::SuccessfulAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(UserEventProgress::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One progress row per user x category x event
        manager
            .create_index(
                Index::create()
                    .name("idx_user_event_progress_key")
                    .table(UserEventProgress::Table)
                    .col(UserEventProgress::UserId)
                    .col(UserEventProgress::CategoryKey)
                    .col(UserEventProgress::EventName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Due-count queries filter on next_review
        manager
            .create_index(
                Index::create()
                    .name("idx_user_event_progress_next_review")
                    .table(UserEventProgress::Table)
                    .col(UserEventProgress::NextReview)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserEventProgress::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserStats {
    Table,
    UserId,
    TotalGames,
    Wins,
    Losses,
    TotalScore,
    TotalDistanceError,
    TotalYearError,
    TotalRounds,
    BestRoundScore,
    BestGameScore,
    CurrentWinStreak,
    BestWinStreak,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserEventProgress {
    Table,
    Id,
    UserId,
    CategoryKey,
    EventName,
    EaseFactor,
    IntervalDays,
    Repetitions,
    LastQuality,
    LastYearError,
    LastDistanceKm,
    NextReview,
    LastReview,
    TotalAttempts,
    SuccessfulAttempts,
    UpdatedAt,
}
