use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::ApplyError;
use crate::building::Building;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^1[3-9]\d{9}$").expect("phone pattern")
});

/// Mainland mobile number: 11 digits starting with 13–19.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RealName,
    Phone,
    CompanyName,
    LicenseNo,
}

/// Application form state. `can_submit` is recomputed after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationForm {
    pub real_name: String,
    pub phone: String,
    pub building_id: Option<i64>,
    pub building_name: String,
    pub company_name: String,
    pub license_no: String,
    can_submit: bool,
}

impl ApplicationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_submit(&self) -> bool {
        self.can_submit
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::RealName => self.real_name = value,
            Field::Phone => self.phone = value,
            Field::CompanyName => self.company_name = value,
            Field::LicenseNo => self.license_no = value,
        }
        self.validate();
    }

    pub fn set_building(&mut self, building: &Building) {
        self.building_id = Some(building.id);
        self.building_name = building.display_name();
        self.validate();
    }

    /// Recompute `can_submit`: name, phone and a building are present.
    pub fn validate(&mut self) -> bool {
        self.can_submit = !self.real_name.trim().is_empty()
            && !self.phone.trim().is_empty()
            && self.building_id.is_some();
        self.can_submit
    }

    /// Field checks in display order; the first failure wins.
    pub fn check(&self) -> Result<(), ApplyError> {
        let fail = |m: &str| Err(ApplyError::ValidationFailed(m.to_string()));
        if self.real_name.trim().is_empty() {
            return fail("请输入真实姓名");
        }
        if self.phone.trim().is_empty() {
            return fail("请输入手机号码");
        }
        if !is_valid_phone(&self.phone) {
            return fail("请输入正确的手机号码");
        }
        if self.building_id.is_none() {
            return fail("请选择申请楼盘");
        }
        Ok(())
    }

    /// Whether leaving would discard typed input.
    pub fn has_data(&self) -> bool {
        [&self.real_name, &self.phone, &self.company_name, &self.license_no]
            .iter()
            .any(|v| !v.is_empty())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Body of `POST /broker-applications`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub user_id: u64,
    pub real_name: String,
    pub phone: String,
    pub building_id: i64,
    pub company_name: String,
    pub license_no: String,
}

impl ApplicationRequest {
    /// Build from a checked form.
    pub fn new(user_id: u64, form: &ApplicationForm) -> Result<Self, ApplyError> {
        let building_id = form
            .building_id
            .ok_or_else(|| ApplyError::ValidationFailed("请选择申请楼盘".into()))?;
        Ok(Self {
            user_id,
            real_name: form.real_name.trim().to_string(),
            phone: form.phone.trim().to_string(),
            building_id,
            company_name: form.company_name.trim().to_string(),
            license_no: form.license_no.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building() -> Building {
        Building {
            id: 7,
            name: "万科城".into(),
            address: "文一西路".into(),
            district: "西湖区".into(),
        }
    }

    #[test]
    fn phone_pattern() {
        assert!(is_valid_phone("13812345678"));
        assert!(is_valid_phone("19900000000"));
        assert!(!is_valid_phone("12345678901"));
        assert!(!is_valid_phone("1381234567"));
        assert!(!is_valid_phone("138123456789"));
        assert!(!is_valid_phone(" 13812345678"));
    }

    #[test]
    fn can_submit_tracks_required_fields() {
        let mut form = ApplicationForm::new();
        assert!(!form.can_submit());

        form.set_field(Field::RealName, "张三");
        form.set_field(Field::Phone, "13812345678");
        assert!(!form.can_submit());

        form.set_building(&building());
        assert!(form.can_submit());
        assert_eq!(form.building_name, "万科城 (文一西路)");

        form.set_field(Field::RealName, "   ");
        assert!(!form.can_submit());
    }

    #[test]
    fn checks_run_in_order() {
        let mut form = ApplicationForm::new();
        let msg = |f: &ApplicationForm| match f.check() {
            Err(ApplyError::ValidationFailed(m)) => m,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(msg(&form), "请输入真实姓名");
        form.set_field(Field::RealName, "张三");
        assert_eq!(msg(&form), "请输入手机号码");
        form.set_field(Field::Phone, "12345678901");
        assert_eq!(msg(&form), "请输入正确的手机号码");
        form.set_field(Field::Phone, "13812345678");
        assert_eq!(msg(&form), "请选择申请楼盘");
        form.set_building(&building());
        assert!(form.check().is_ok());
    }

    #[test]
    fn padded_phone_passes_presence_but_not_pattern() {
        let mut form = ApplicationForm::new();
        form.set_field(Field::RealName, "张三");
        form.set_field(Field::Phone, "13812345678 ");
        form.set_building(&building());
        assert!(form.can_submit());
        assert!(matches!(form.check(), Err(ApplyError::ValidationFailed(_))));
    }

    #[test]
    fn has_data_and_reset() {
        let mut form = ApplicationForm::new();
        assert!(!form.has_data());
        form.set_field(Field::LicenseNo, "ZJ-001");
        assert!(form.has_data());
        form.reset();
        assert_eq!(form, ApplicationForm::new());
    }

    #[test]
    fn request_trims_fields() {
        let mut form = ApplicationForm::new();
        form.set_field(Field::RealName, " 张三 ");
        form.set_field(Field::Phone, "13812345678");
        form.set_field(Field::CompanyName, " 链家 ");
        form.set_building(&building());

        let body = serde_json::to_value(ApplicationRequest::new(42, &form).unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "userId": 42,
                "realName": "张三",
                "phone": "13812345678",
                "buildingId": 7,
                "companyName": "链家",
                "licenseNo": ""
            })
        );
    }
}
