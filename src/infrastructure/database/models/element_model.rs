use diesel::prelude::*;

use crate::domain::entities::{Element, ElementKind, NewElement};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::schema::elements;

#[derive(Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name = elements)]
pub struct ElementModel {
    pub id: i64,
    pub document_id: i64,
    pub ordinal: i32,
    pub kind: String,
    pub page: Option<i32>,
    pub level: Option<i32>,
    pub text: String,
    pub table_markdown: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = elements)]
pub struct NewElementModel {
    pub document_id: i64,
    pub ordinal: i32,
    pub kind: String,
    pub page: Option<i32>,
    pub level: Option<i32>,
    pub text: String,
    pub table_markdown: Option<String>,
}

impl NewElementModel {
    pub fn from_domain(document_id: i64, element: NewElement) -> Self {
        Self {
            document_id,
            ordinal: element.ordinal,
            kind: element.kind.as_str().to_string(),
            page: element.page,
            level: element.level,
            text: element.text,
            table_markdown: element.table_markdown,
        }
    }
}

impl TryFrom<ElementModel> for Element {
    type Error = RepositoryError;

    fn try_from(model: ElementModel) -> Result<Self, Self::Error> {
        Ok(Element {
            id: model.id,
            document_id: model.document_id,
            ordinal: model.ordinal,
            kind: ElementKind::from_str(&model.kind).map_err(RepositoryError::Corrupt)?,
            page: model.page,
            level: model.level,
            text: model.text,
            table_markdown: model.table_markdown,
        })
    }
}
