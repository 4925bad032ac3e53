//! Candidate fact tree shapes produced by the extractor.
//!
//! # Responsibility
//! - Define the product and branch tree shapes with claim/plain fields.
//! - Implement `FactObject` for each shape so walking stays exhaustive.
//!
//! # See also
//! - `crate::grounding` for the claim walk.
//! - `crate::projection` for the flat property views.

use crate::model::claim::{accept_all, AtomicClaim, ClaimVisitor, FactObject, Field, PropertyValue};
use serde::{Deserialize, Serialize};

/// Classified product kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    InterestProduct,
    CheckingAccount,
    Security,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InterestProduct => "InterestProduct",
            Self::CheckingAccount => "CheckingAccount",
            Self::Security => "Security",
        }
    }
}

/// Estimated product risk class, serialized as `"1"`..`"5"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskClass {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
}

impl RiskClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
        }
    }
}

/// Employee role classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleType {
    Advisor,
    Service,
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Advisor => "Advisor",
            Self::Service => "Service",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductModel {
    pub name: Option<AtomicClaim>,
    pub description: Option<AtomicClaim>,
}

impl FactObject for ProductModel {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("name", Field::Claim(self.name.as_ref())),
            ("description", Field::Claim(self.description.as_ref())),
        ]
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        visitor.visit_claim("name", &mut self.name);
        visitor.visit_claim("description", &mut self.description);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTypeModel {
    pub name: ProductType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskClassModel {
    pub risk_class: RiskClass,
}

/// One financial condition (amount band, term and rate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionModel {
    #[serde(rename = "type")]
    pub kind: Option<AtomicClaim>,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub term_years: Option<i64>,
    pub interest_rate: Option<AtomicClaim>,
}

impl FactObject for ConditionModel {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("type", Field::Claim(self.kind.as_ref())),
            ("min_amount", Field::Plain(self.min_amount.map(PropertyValue::from))),
            ("max_amount", Field::Plain(self.max_amount.map(PropertyValue::from))),
            ("term_years", Field::Plain(self.term_years.map(PropertyValue::from))),
            ("interest_rate", Field::Claim(self.interest_rate.as_ref())),
        ]
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        visitor.visit_claim("type", &mut self.kind);
        visitor.visit_claim("interest_rate", &mut self.interest_rate);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqModel {
    pub question: Option<AtomicClaim>,
    pub answer: Option<AtomicClaim>,
}

impl FactObject for FaqModel {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("question", Field::Claim(self.question.as_ref())),
            ("answer", Field::Claim(self.answer.as_ref())),
        ]
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        visitor.visit_claim("question", &mut self.question);
        visitor.visit_claim("answer", &mut self.answer);
    }
}

/// Top-level product extraction: product, classification, conditions and FAQs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductData {
    pub product: ProductModel,
    pub product_type: Option<ProductTypeModel>,
    pub risk_class: Option<RiskClassModel>,
    pub conditions: Option<Vec<ConditionModel>>,
    pub faqs: Option<Vec<FaqModel>>,
}

impl FactObject for ProductData {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        Vec::new()
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        self.product.accept(visitor);
        if let Some(conditions) = self.conditions.as_mut() {
            accept_all(conditions, visitor);
        }
        if let Some(faqs) = self.faqs.as_mut() {
            accept_all(faqs, visitor);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeModel {
    pub name: Option<AtomicClaim>,
    pub email: Option<AtomicClaim>,
    pub phone: Option<AtomicClaim>,
    pub role_type: RoleType,
}

impl FactObject for EmployeeModel {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("name", Field::Claim(self.name.as_ref())),
            ("email", Field::Claim(self.email.as_ref())),
            ("phone", Field::Claim(self.phone.as_ref())),
            (
                "role_type",
                Field::Plain(Some(PropertyValue::from(self.role_type.as_str()))),
            ),
        ]
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        visitor.visit_claim("name", &mut self.name);
        visitor.visit_claim("email", &mut self.email);
        visitor.visit_claim("phone", &mut self.phone);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchModel {
    pub name: Option<AtomicClaim>,
    pub address: Option<AtomicClaim>,
    #[serde(default)]
    pub employees: Vec<EmployeeModel>,
}

impl FactObject for BranchModel {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        vec![
            ("name", Field::Claim(self.name.as_ref())),
            ("address", Field::Claim(self.address.as_ref())),
        ]
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        visitor.visit_claim("name", &mut self.name);
        visitor.visit_claim("address", &mut self.address);
        accept_all(&mut self.employees, visitor);
    }
}

/// Top-level branch extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchData {
    pub branch: BranchModel,
}

impl FactObject for BranchData {
    fn fields(&self) -> Vec<(&'static str, Field<'_>)> {
        Vec::new()
    }

    fn accept(&mut self, visitor: &mut dyn ClaimVisitor) {
        self.branch.accept(visitor);
    }
}
