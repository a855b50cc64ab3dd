use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RouteOtpChallenges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RouteOtpChallenges::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::OwnerUserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::RouteKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::CodeHash)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::CodeSalt)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::MaxAttempts)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RouteOtpChallenges::InvalidatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RouteOtpChallenges::ConsumedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(RouteOtpChallenges::IpAddress).string())
                    .col(ColumnDef::new(RouteOtpChallenges::UserAgent).string())
                    .col(
                        ColumnDef::new(RouteOtpChallenges::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteOtpChallenges::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Serves latest-challenge lookups and the trailing 24h send count.
        manager
            .create_index(
                Index::create()
                    .table(RouteOtpChallenges::Table)
                    .col(RouteOtpChallenges::OwnerUserId)
                    .col(RouteOtpChallenges::RouteKey)
                    .col(RouteOtpChallenges::CreatedAt)
                    .name("idx_route_otp_challenges_owner_route_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RouteOtpChallenges::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RouteOtpChallenges {
    Table,
    Id,
    OwnerUserId,
    RouteKey,
    CodeHash,
    CodeSalt,
    AttemptCount,
    MaxAttempts,
    ExpiresAt,
    InvalidatedAt,
    ConsumedAt,
    IpAddress,
    UserAgent,
    CreatedAt,
    UpdatedAt,
}
