use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RouteAccessGrants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RouteAccessGrants::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RouteAccessGrants::OwnerUserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteAccessGrants::RouteKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RouteAccessGrants::Method).string().not_null())
                    .col(
                        ColumnDef::new(RouteAccessGrants::VerifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteAccessGrants::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RouteAccessGrants::RevokedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(RouteAccessGrants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RouteAccessGrants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Conflict target for the grant upsert.
        manager
            .create_index(
                Index::create()
                    .table(RouteAccessGrants::Table)
                    .col(RouteAccessGrants::OwnerUserId)
                    .col(RouteAccessGrants::RouteKey)
                    .col(RouteAccessGrants::Method)
                    .name("uq_route_access_grants_owner_route_method")
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RouteAccessGrants::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum RouteAccessGrants {
    Table,
    Id,
    OwnerUserId,
    RouteKey,
    Method,
    VerifiedAt,
    ExpiresAt,
    RevokedAt,
    CreatedAt,
    UpdatedAt,
}
