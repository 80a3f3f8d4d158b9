use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmergencyAlerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(EmergencyAlerts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(EmergencyAlerts::AlertType).string().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::PetId).integer().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::ReporterId).integer().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Title).string_len(100).not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Description).text().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Latitude).double().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Longitude).double().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::Address).string())
                    .col(ColumnDef::new(EmergencyAlerts::Accuracy).double())
                    .col(ColumnDef::new(EmergencyAlerts::IncidentTime).date_time().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::ReportTime).date_time().not_null())
                    .col(
                        ColumnDef::new(EmergencyAlerts::UrgencyLevel)
                            .string()
                            .default("medium")
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::UrgencyRank)
                            .small_integer()
                            .default(2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::Status)
                            .string()
                            .default("active")
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmergencyAlerts::Attachments).json().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::ContactInfo).json())
                    .col(
                        ColumnDef::new(EmergencyAlerts::ForcePropagation)
                            .boolean()
                            .default(true)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::PropagationRadius)
                            .double()
                            .default(5.0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::PropagationDelay)
                            .integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmergencyAlerts::PropagationDuration)
                            .integer()
                            .default(24)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmergencyAlerts::Responses).json().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::TotalReached).big_integer().default(0).not_null())
                    .col(ColumnDef::new(EmergencyAlerts::TotalViews).big_integer().default(0).not_null())
                    .col(ColumnDef::new(EmergencyAlerts::TotalShares).big_integer().default(0).not_null())
                    .col(ColumnDef::new(EmergencyAlerts::TotalResponses).big_integer().default(0).not_null())
                    .col(ColumnDef::new(EmergencyAlerts::ExpiresAt).date_time())
                    .col(ColumnDef::new(EmergencyAlerts::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(EmergencyAlerts::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await?;

        // Listing: active alerts by urgency, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_status_urgency_created")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::Status)
                    .col(EmergencyAlerts::UrgencyRank)
                    .col(EmergencyAlerts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_location")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::Latitude)
                    .col(EmergencyAlerts::Longitude)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_type_status")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::AlertType)
                    .col(EmergencyAlerts::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_reporter_created")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::ReporterId)
                    .col(EmergencyAlerts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Scanned by the expiry sweeper
        manager
            .create_index(
                Index::create()
                    .name("idx_emergency_alerts_expires_at")
                    .table(EmergencyAlerts::Table)
                    .col(EmergencyAlerts::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmergencyAlerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmergencyAlerts {
    Table,
    Id,
    AlertType,
    PetId,
    ReporterId,
    Title,
    Description,
    Latitude,
    Longitude,
    Address,
    Accuracy,
    IncidentTime,
    ReportTime,
    UrgencyLevel,
    UrgencyRank,
    Status,
    Attachments,
    ContactInfo,
    ForcePropagation,
    PropagationRadius,
    PropagationDelay,
    PropagationDuration,
    Responses,
    TotalReached,
    TotalViews,
    TotalShares,
    TotalResponses,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
