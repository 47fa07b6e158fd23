use serde::{Deserialize, Serialize};

use crate::ApplyError;

/// A building open for applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: String,
}

impl Building {
    /// `"{name} ({address})"`.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    pub buildings: Vec<Building>,
}

/// Two-level district → building picker.
///
/// Districts keep the order of their first appearance; the first one is
/// selected after loading.
#[derive(Debug, Clone, Default)]
pub struct BuildingPicker {
    districts: Vec<District>,
    selected_district: Option<usize>,
    selected_building: Option<Building>,
    visible: bool,
}

impl BuildingPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, buildings: Vec<Building>) {
        let mut districts: Vec<District> = Vec::new();
        for building in buildings {
            match districts.iter_mut().find(|d| d.name == building.district) {
                Some(d) => d.buildings.push(building),
                None => districts.push(District {
                    name: building.district.clone(),
                    buildings: vec![building],
                }),
            }
        }
        self.selected_district = if districts.is_empty() { None } else { Some(0) };
        self.districts = districts;
        self.selected_building = None;
    }

    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    pub fn selected_district(&self) -> Option<&str> {
        self.selected_district
            .map(|i| self.districts[i].name.as_str())
    }

    /// Buildings of the selected district.
    pub fn current_buildings(&self) -> &[Building] {
        match self.selected_district {
            Some(i) => &self.districts[i].buildings,
            None => &[],
        }
    }

    pub fn selected_building(&self) -> Option<&Building> {
        self.selected_building.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show the picker with no building selected.
    pub fn open(&mut self) {
        self.visible = true;
        self.selected_building = None;
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    /// Switch district, dropping any building selection. Unknown names are ignored.
    pub fn select_district(&mut self, name: &str) -> bool {
        match self.districts.iter().position(|d| d.name == name) {
            Some(i) => {
                self.selected_district = Some(i);
                self.selected_building = None;
                true
            }
            None => false,
        }
    }

    /// Select a building of the current district.
    pub fn select_building(&mut self, id: i64) -> bool {
        let found = self.current_buildings().iter().find(|b| b.id == id).cloned();
        match found {
            Some(building) => {
                self.selected_building = Some(building);
                true
            }
            None => false,
        }
    }

    /// Take the selection and close the picker.
    pub fn confirm(&mut self) -> Result<Building, ApplyError> {
        let building = self
            .selected_building
            .clone()
            .ok_or_else(|| ApplyError::ValidationFailed("请选择楼盘".into()))?;
        self.visible = false;
        Ok(building)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(id: i64, name: &str, district: &str) -> Building {
        Building {
            id,
            name: name.into(),
            address: format!("{}路{}号", district, id),
            district: district.into(),
        }
    }

    fn sample() -> Vec<Building> {
        vec![
            b(1, "万科城", "西湖区"),
            b(2, "绿城桂花园", "滨江区"),
            b(3, "金地自在城", "西湖区"),
            b(4, "龙湖天街", "余杭区"),
        ]
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let mut picker = BuildingPicker::new();
        picker.load(sample());

        let names: Vec<&str> = picker.districts().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["西湖区", "滨江区", "余杭区"]);
        assert_eq!(picker.selected_district(), Some("西湖区"));
        let ids: Vec<i64> = picker.current_buildings().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn empty_list_has_no_district() {
        let mut picker = BuildingPicker::new();
        picker.load(Vec::new());
        assert!(picker.selected_district().is_none());
        assert!(picker.current_buildings().is_empty());
    }

    #[test]
    fn district_switch_clears_selection() {
        let mut picker = BuildingPicker::new();
        picker.load(sample());
        assert!(picker.select_building(3));

        assert!(picker.select_district("滨江区"));
        assert!(picker.selected_building().is_none());
        let ids: Vec<i64> = picker.current_buildings().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![2]);
        assert!(matches!(picker.confirm(), Err(ApplyError::ValidationFailed(ref m)) if m == "请选择楼盘"));
    }

    #[test]
    fn only_current_district_buildings_are_selectable() {
        let mut picker = BuildingPicker::new();
        picker.load(sample());
        assert!(!picker.select_building(4));
        assert!(!picker.select_district("上城区"));
        assert_eq!(picker.selected_district(), Some("西湖区"));
    }

    #[test]
    fn open_resets_then_confirm() {
        let mut picker = BuildingPicker::new();
        picker.load(sample());
        picker.select_building(1);
        picker.open();
        assert!(picker.is_visible());
        assert!(picker.selected_building().is_none());

        picker.select_building(3);
        let building = picker.confirm().unwrap();
        assert_eq!(building.display_name(), "金地自在城 (西湖区路3号)");
        assert!(!picker.is_visible());
    }
}
