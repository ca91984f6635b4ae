use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CookieReceipts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CookieReceipts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CookieReceipts::ReceiverName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CookieReceipts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CookieReceipts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CookieReceipts {
    Table,
    Id,
    ReceiverName,
    CreatedAt,
}
