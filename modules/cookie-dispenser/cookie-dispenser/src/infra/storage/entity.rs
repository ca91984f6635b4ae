use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::domain::repo::CookieReceipt;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cookie_receipts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub receiver_name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for CookieReceipt {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            receiver_name: model.receiver_name,
            created_at: model.created_at,
        }
    }
}
