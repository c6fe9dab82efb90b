use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_service_offerings_table::Migration),
            Box::new(m20260101_000002_create_bookings_table::Migration),
            Box::new(m20260101_000003_create_booking_items_table::Migration),
            Box::new(m20260101_000004_create_booking_assignments_table::Migration),
            Box::new(m20260101_000005_create_payments_table::Migration),
            Box::new(m20260101_000006_create_coupons_table::Migration),
            Box::new(m20260101_000007_create_booking_counters_table::Migration),
        ]
    }
}

// Migration implementations

mod m20260101_000001_create_service_offerings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000001_create_service_offerings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ServiceOfferings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ServiceOfferings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceOfferings::Name).string().not_null())
                        .col(ColumnDef::new(ServiceOfferings::Slug).string().not_null())
                        .col(ColumnDef::new(ServiceOfferings::Category).string().null())
                        .col(
                            ColumnDef::new(ServiceOfferings::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::BasePrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceOfferings::AddOns).json().not_null())
                        .col(
                            ColumnDef::new(ServiceOfferings::DurationMinutes)
                                .integer()
                                .not_null()
                                .default(120),
                        )
                        .col(
                            ColumnDef::new(ServiceOfferings::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ServiceOfferings::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_service_offerings_slug")
                        .table(ServiceOfferings::Table)
                        .col(ServiceOfferings::Slug)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ServiceOfferings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum ServiceOfferings {
        Table,
        Id,
        Name,
        Slug,
        Category,
        Active,
        BasePrice,
        AddOns,
        DurationMinutes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000002_create_bookings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000002_create_bookings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Bookings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Bookings::BookingNumber).string().not_null())
                        .col(ColumnDef::new(Bookings::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Bookings::Status).string().not_null())
                        .col(ColumnDef::new(Bookings::ServiceAddress).string().not_null())
                        .col(
                            ColumnDef::new(Bookings::ScheduledDate)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::ScheduledTimeSlot)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::SpecialInstructions)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Bookings::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::Tax).decimal().not_null().default(0))
                        .col(
                            ColumnDef::new(Bookings::Discount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Bookings::Total)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Bookings::CouponCode).string().null())
                        .col(ColumnDef::new(Bookings::PaymentId).uuid().null())
                        .col(ColumnDef::new(Bookings::CancelledBy).uuid().null())
                        .col(ColumnDef::new(Bookings::CancelledAt).timestamp().null())
                        .col(ColumnDef::new(Bookings::CancellationReason).string().null())
                        .col(ColumnDef::new(Bookings::RefundAmount).decimal().null())
                        .col(ColumnDef::new(Bookings::CompletedAt).timestamp().null())
                        .col(ColumnDef::new(Bookings::CompletionNotes).string().null())
                        .col(ColumnDef::new(Bookings::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Bookings::UpdatedAt).timestamp().null())
                        .col(
                            ColumnDef::new(Bookings::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Concurrency control for same-day numbering rests on this index.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_booking_number")
                        .table(Bookings::Table)
                        .col(Bookings::BookingNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_customer_id")
                        .table(Bookings::Table)
                        .col(Bookings::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bookings_status")
                        .table(Bookings::Table)
                        .col(Bookings::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Bookings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Bookings {
        Table,
        Id,
        BookingNumber,
        CustomerId,
        Status,
        ServiceAddress,
        ScheduledDate,
        ScheduledTimeSlot,
        SpecialInstructions,
        Subtotal,
        Tax,
        Discount,
        Total,
        CouponCode,
        PaymentId,
        CancelledBy,
        CancelledAt,
        CancellationReason,
        RefundAmount,
        CompletedAt,
        CompletionNotes,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20260101_000003_create_booking_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000003_create_booking_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BookingItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BookingItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingItems::BookingId).uuid().not_null())
                        .col(ColumnDef::new(BookingItems::ServiceId).uuid().not_null())
                        .col(ColumnDef::new(BookingItems::ServiceName).string().not_null())
                        .col(ColumnDef::new(BookingItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(BookingItems::BasePrice).decimal().not_null())
                        .col(ColumnDef::new(BookingItems::AddOns).json().not_null())
                        .col(ColumnDef::new(BookingItems::Subtotal).decimal().not_null())
                        .col(ColumnDef::new(BookingItems::Position).integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_booking_items_booking_id")
                        .table(BookingItems::Table)
                        .col(BookingItems::BookingId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BookingItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum BookingItems {
        Table,
        Id,
        BookingId,
        ServiceId,
        ServiceName,
        Quantity,
        BasePrice,
        AddOns,
        Subtotal,
        Position,
    }
}

mod m20260101_000004_create_booking_assignments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000004_create_booking_assignments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BookingAssignments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BookingAssignments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BookingAssignments::BookingId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BookingAssignments::StaffId).uuid().not_null())
                        .col(ColumnDef::new(BookingAssignments::Role).string().not_null())
                        .col(
                            ColumnDef::new(BookingAssignments::AssignedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_booking_assignments_booking_staff")
                        .table(BookingAssignments::Table)
                        .col(BookingAssignments::BookingId)
                        .col(BookingAssignments::StaffId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_booking_assignments_staff_id")
                        .table(BookingAssignments::Table)
                        .col(BookingAssignments::StaffId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BookingAssignments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum BookingAssignments {
        Table,
        Id,
        BookingId,
        StaffId,
        Role,
        AssignedAt,
    }
}

mod m20260101_000005_create_payments_table {
    use sea_orm_migration::prelude::*;
    use sea_orm_migration::sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000005_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::TransactionId).string().not_null())
                        .col(ColumnDef::new(Payments::BookingId).uuid().not_null())
                        .col(ColumnDef::new(Payments::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Amount).decimal().not_null())
                        .col(ColumnDef::new(Payments::Currency).string().not_null())
                        .col(ColumnDef::new(Payments::PaymentMethod).string().not_null())
                        .col(ColumnDef::new(Payments::Gateway).string().not_null())
                        .col(ColumnDef::new(Payments::GatewayOrderId).string().null())
                        .col(ColumnDef::new(Payments::GatewayPaymentId).string().null())
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::FailureReason).string().null())
                        .col(
                            ColumnDef::new(Payments::IsRefunded)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Payments::RefundAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Payments::RefundTransactionId)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Payments::RefundedAt).timestamp().null())
                        .col(ColumnDef::new(Payments::RefundReason).string().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_transaction_id")
                        .table(Payments::Table)
                        .col(Payments::TransactionId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_booking_id")
                        .table(Payments::Table)
                        .col(Payments::BookingId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_gateway_order_id")
                        .table(Payments::Table)
                        .col(Payments::GatewayOrderId)
                        .to_owned(),
                )
                .await?;

            // At most one successful payment per booking, enforced by
            // the database itself. Partial indexes are supported by
            // both PostgreSQL and SQLite.
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_single_success \
                     ON payments (booking_id) WHERE status = 'success'",
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Payments {
        Table,
        Id,
        TransactionId,
        BookingId,
        CustomerId,
        Amount,
        Currency,
        PaymentMethod,
        Gateway,
        GatewayOrderId,
        GatewayPaymentId,
        Status,
        FailureReason,
        IsRefunded,
        RefundAmount,
        RefundTransactionId,
        RefundedAt,
        RefundReason,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000006_create_coupons_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000006_create_coupons_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Coupons::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Coupons::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Coupons::Code).string().not_null())
                        .col(ColumnDef::new(Coupons::DiscountType).string().not_null())
                        .col(ColumnDef::new(Coupons::DiscountValue).decimal().not_null())
                        .col(ColumnDef::new(Coupons::MaxDiscount).decimal().null())
                        .col(
                            ColumnDef::new(Coupons::MinOrderValue)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Coupons::ValidFrom).timestamp().not_null())
                        .col(ColumnDef::new(Coupons::ValidUntil).timestamp().not_null())
                        .col(ColumnDef::new(Coupons::UsageLimit).integer().null())
                        .col(
                            ColumnDef::new(Coupons::UsageCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Coupons::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Coupons::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Coupons::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_coupons_code")
                        .table(Coupons::Table)
                        .col(Coupons::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Coupons::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Coupons {
        Table,
        Id,
        Code,
        DiscountType,
        DiscountValue,
        MaxDiscount,
        MinOrderValue,
        ValidFrom,
        ValidUntil,
        UsageLimit,
        UsageCount,
        Active,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260101_000007_create_booking_counters_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260101_000007_create_booking_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BookingCounters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BookingCounters::Day)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BookingCounters::Seq)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BookingCounters::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum BookingCounters {
        Table,
        Day,
        Seq,
    }
}
