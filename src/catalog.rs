use crate::error::PipelineError;
use crate::line::{optional_text_column, text_column};

use rusqlite::Row;
use serde::Serialize;

pub(crate) const ITEM_SQL: &str = "SELECT item.item_num,
               item.descr,
               sub_department.description AS subdepartment,
               department.description AS department,
               department_group.name1 AS category,
               item.pri_vndr AS vendor_name,
               item_extra.notes AS notes
          FROM item
          JOIN sub_department ON item.deptsubdept = sub_department.deptsubdept
          JOIN department ON sub_department.dept = department.dept
          JOIN department_group ON department.dept_cat = department_group.dept_group
          LEFT OUTER JOIN item_extra ON item.item_num = item_extra.item_num
         WHERE item.item_num = ?1";

pub(crate) const ITEMS_SQL: &str = "SELECT item.item_num,
               item.descr,
               sub_department.description AS subdepartment,
               department.description AS department,
               department_group.name1 AS category,
               item.pri_vndr AS vendor_name,
               item_extra.notes AS notes
          FROM item
          JOIN sub_department ON item.deptsubdept = sub_department.deptsubdept
          JOIN department ON sub_department.dept = department.dept
          JOIN department_group ON department.dept_cat = department_group.dept_group
          LEFT OUTER JOIN item_extra ON item.item_num = item_extra.item_num
         WHERE (item.deleted_flag = 'N' OR ?1)
         ORDER BY item.item_num";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub descr: String,
    pub category: String,
    pub department: String,
    pub subdepartment: String,
    pub vendor_name: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<&Row<'_>> for Item {
    type Error = PipelineError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Item {
            id: text_column(row, "item_num")?,
            descr: text_column(row, "descr")?,
            category: text_column(row, "category")?,
            department: text_column(row, "department")?,
            subdepartment: text_column(row, "subdepartment")?,
            vendor_name: optional_text_column(row, "vendor_name")?,
            notes: optional_text_column(row, "notes")?,
        })
    }
}
