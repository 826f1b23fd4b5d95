use serde::Serialize;

use crate::prepare::PreparedDataset;

/// Signal names offered in the scatter menus.
///
/// Only numeric columns are listed; the synthetic timestamp, the derived
/// color and the `class` label are not selectable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRegistry {
    names: Vec<String>,
}

/// Menu entry, label and value are the column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

impl ColumnRegistry {
    pub fn from_dataset(dataset: &PreparedDataset) -> Self {
        let names = dataset
            .columns()
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn options(&self) -> Vec<MenuOption> {
        self.names
            .iter()
            .map(|n| MenuOption { label: n.clone(), value: n.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_table;
    use crate::prepare::prepare;

    #[test]
    fn lists_numeric_columns_in_source_order() {
        let text = "Extra;Drill_Pressure;Drilling_Surf_Quality;Drilling_Speed;Milling_Gear_Depth;Milling_Circle_Diameter;Turning_Cut_Speed;Turning_Cut_Depth;class;Operator\n\
                    9;1;2;3;4;5;6;7;OK;anna\n";
        let (raw, _) = parse_table(text, ';').unwrap();
        let ds = prepare(&raw, 10).unwrap();
        let reg = ColumnRegistry::from_dataset(&ds);
        assert_eq!(reg.len(), 8);
        assert_eq!(reg.names()[0], "Extra");
        assert!(reg.contains("Turning_Cut_Depth"));
        assert!(!reg.contains("class"));
        assert!(!reg.contains("Operator"));
        assert!(!reg.contains("color"));
        for name in reg.names() {
            assert!(ds.numeric(name).is_some());
        }
        assert_eq!(reg.options()[1], MenuOption { label: "Drill_Pressure".into(), value: "Drill_Pressure".into() });
    }
}
