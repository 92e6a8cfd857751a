//! Create diagnose_reports table.
//!
//! Built with the schema builder so the same migration runs on PostgreSQL and SQLite.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DiagnoseReports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DiagnoseReports::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DiagnoseReports::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DiagnoseReports::EndTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DiagnoseReports::CompareStartTime).timestamp_with_time_zone())
                    .col(ColumnDef::new(DiagnoseReports::CompareEndTime).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(DiagnoseReports::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DiagnoseReports::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(DiagnoseReports::ErrorMessage).text())
                    .col(ColumnDef::new(DiagnoseReports::Content).text())
                    .col(
                        ColumnDef::new(DiagnoseReports::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DiagnoseReports::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_diagnose_reports_created_at")
                    .table(DiagnoseReports::Table)
                    .col(DiagnoseReports::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Startup recovery scans unfinished jobs
        manager
            .create_index(
                Index::create()
                    .name("idx_diagnose_reports_status")
                    .table(DiagnoseReports::Table)
                    .col(DiagnoseReports::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DiagnoseReports::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum DiagnoseReports {
    Table,
    Id,
    StartTime,
    EndTime,
    CompareStartTime,
    CompareEndTime,
    Progress,
    Status,
    ErrorMessage,
    Content,
    CreatedAt,
    UpdatedAt,
}
