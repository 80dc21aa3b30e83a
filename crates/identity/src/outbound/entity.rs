//! SeaORM table definitions for the identity schema.

pub mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        #[sea_orm(unique)]
        pub username: String,
        pub display_name: String,
        pub email: String,
        pub provider: String,
        #[sea_orm(column_type = "JsonBinary", nullable)]
        pub provider_data: Option<Json>,
        #[sea_orm(column_type = "JsonBinary")]
        pub additional_providers_data: Json,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_one = "super::user_credentials::Entity")]
        UserCredentials,
    }

    impl Related<super::user_credentials::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::UserCredentials.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod user_credentials {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "user_credentials")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: i64,
        pub hashed_password: String,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::users::Entity",
            from = "Column::UserId",
            to = "super::users::Column::Id"
        )]
        Users,
    }

    impl Related<super::users::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Users.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod prelude {
    pub use super::user_credentials::Entity as UserCredentials;
    pub use super::users::Entity as Users;
}
