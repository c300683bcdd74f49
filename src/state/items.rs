use serde::{Deserialize, Serialize};

/// Cook progress at which raw food becomes cooked.
pub const COOK_PROGRESS: u32 = 20;
/// Cook progress at which cooked food burns.
pub const BURN_PROGRESS: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FoodKind {
    Egg,
    Onions,
    Meat,
    Noodles,
    Sauce,
}

impl FoodKind {
    pub fn can_chop(&self) -> bool {
        matches!(self, FoodKind::Onions | FoodKind::Meat)
    }

    pub fn can_cook(&self) -> bool {
        matches!(self, FoodKind::Egg | FoodKind::Meat)
    }

    pub fn buy_cost(&self) -> i32 {
        match self {
            FoodKind::Egg => 20,
            FoodKind::Onions => 30,
            FoodKind::Meat => 80,
            FoodKind::Noodles => 40,
            FoodKind::Sauce => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CookStage {
    Raw,
    Cooked,
    Burnt,
}

impl CookStage {
    pub fn from_progress(progress: u32) -> Self {
        if progress >= BURN_PROGRESS {
            CookStage::Burnt
        } else if progress >= COOK_PROGRESS {
            CookStage::Cooked
        } else {
            CookStage::Raw
        }
    }
}

impl TryFrom<u8> for CookStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CookStage::Raw),
            1 => Ok(CookStage::Cooked),
            2 => Ok(CookStage::Burnt),
            other => Err(format!("invalid cook stage {}", other)),
        }
    }
}

impl From<CookStage> for u8 {
    fn from(stage: CookStage) -> Self {
        match stage {
            CookStage::Raw => 0,
            CookStage::Cooked => 1,
            CookStage::Burnt => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    #[serde(rename = "food_name")]
    pub kind: FoodKind,
    #[serde(default)]
    pub chopped: bool,
    #[serde(rename = "cooked_stage", default = "raw_stage")]
    pub stage: CookStage,
    /// Last known cook progress. Survives container changes so re-cooking
    /// resumes instead of restarting.
    #[serde(default)]
    pub cook_progress: u32,
}

fn raw_stage() -> CookStage {
    CookStage::Raw
}

impl Food {
    pub fn raw(kind: FoodKind) -> Self {
        Self {
            kind,
            chopped: false,
            stage: CookStage::Raw,
            cook_progress: 0,
        }
    }

    /// Ready to go on an order plate.
    pub fn is_finished(&self) -> bool {
        self.chopped == self.kind.can_chop()
            && match self.stage {
                CookStage::Raw => !self.kind.can_cook(),
                CookStage::Cooked => self.kind.can_cook(),
                CookStage::Burnt => false,
            }
    }

    pub fn needs_chop(&self) -> bool {
        self.kind.can_chop() && !self.chopped
    }

    pub fn needs_cook(&self) -> bool {
        self.kind.can_cook() && self.stage == CookStage::Raw
    }

    pub fn is_burnt(&self) -> bool {
        self.stage == CookStage::Burnt
    }

    /// Advance cook progress while sitting in a pan on an active cooker.
    /// The stage never moves backwards.
    pub fn advance_cook(&mut self, progress: u32) {
        if progress > self.cook_progress {
            self.cook_progress = progress;
        }
        let stage = CookStage::from_progress(self.cook_progress);
        if stage > self.stage {
            self.stage = stage;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plate {
    #[serde(default)]
    pub dirty: bool,
    #[serde(rename = "food", default)]
    pub foods: Vec<Food>,
}

impl Plate {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_clean_and_empty(&self) -> bool {
        !self.dirty && self.foods.is_empty()
    }

    /// Plate contents equal the required multiset and every food is finished.
    pub fn matches(&self, required: &[FoodKind]) -> bool {
        if self.dirty || self.foods.len() != required.len() {
            return false;
        }
        if !self.foods.iter().all(Food::is_finished) {
            return false;
        }
        let mut have: Vec<FoodKind> = self.foods.iter().map(|f| f.kind).collect();
        let mut want = required.to_vec();
        have.sort();
        want.sort();
        have == want
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pan {
    #[serde(default)]
    pub food: Option<Food>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Item {
    Food(Food),
    Plate(Plate),
    Pan(Pan),
}

impl Item {
    pub fn as_food(&self) -> Option<&Food> {
        match self {
            Item::Food(food) => Some(food),
            _ => None,
        }
    }

    pub fn as_plate(&self) -> Option<&Plate> {
        match self {
            Item::Plate(plate) => Some(plate),
            _ => None,
        }
    }

    pub fn as_pan(&self) -> Option<&Pan> {
        match self {
            Item::Pan(pan) => Some(pan),
            _ => None,
        }
    }

    pub fn is_food_of(&self, kind: FoodKind) -> bool {
        self.as_food().is_some_and(|f| f.kind == kind)
    }

    /// Trash would change something: foods vanish, containers get emptied.
    pub fn has_disposable_contents(&self) -> bool {
        match self {
            Item::Food(_) => true,
            Item::Plate(plate) => !plate.foods.is_empty(),
            Item::Pan(pan) => pan.food.is_some(),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            Item::Food(food) => format!("{:?}", food.kind),
            Item::Plate(plate) if plate.dirty => "DirtyPlate".to_string(),
            Item::Plate(plate) => format!("Plate{:?}", plate.foods.iter().map(|f| f.kind).collect::<Vec<_>>()),
            Item::Pan(Pan { food: Some(food) }) => format!("Pan({:?})", food.kind),
            Item::Pan(_) => "Pan".to_string(),
        }
    }
}

/// Anything the shop sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShopItem {
    Food(FoodKind),
    Plate,
    Pan,
}

impl ShopItem {
    pub fn cost(&self) -> i32 {
        match self {
            ShopItem::Food(kind) => kind.buy_cost(),
            ShopItem::Plate => 2,
            ShopItem::Pan => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_food_rules() {
        let sauce = Food::raw(FoodKind::Sauce);
        assert!(sauce.is_finished());

        let mut meat = Food::raw(FoodKind::Meat);
        assert!(!meat.is_finished());
        meat.chopped = true;
        assert!(!meat.is_finished());
        meat.advance_cook(COOK_PROGRESS);
        assert!(meat.is_finished());
        meat.advance_cook(BURN_PROGRESS);
        assert!(meat.is_burnt());
        assert!(!meat.is_finished());
    }

    #[test]
    fn test_cook_stage_never_regresses() {
        let mut egg = Food::raw(FoodKind::Egg);
        egg.advance_cook(25);
        assert_eq!(egg.stage, CookStage::Cooked);
        egg.advance_cook(3);
        assert_eq!(egg.stage, CookStage::Cooked);
        assert_eq!(egg.cook_progress, 25);
    }

    #[test]
    fn test_plate_matches_required_multiset() {
        let mut noodles = Food::raw(FoodKind::Noodles);
        noodles.chopped = false;
        let mut meat = Food::raw(FoodKind::Meat);
        meat.chopped = true;
        meat.advance_cook(21);
        let plate = Plate {
            dirty: false,
            foods: vec![meat, noodles],
        };
        assert!(plate.matches(&[FoodKind::Noodles, FoodKind::Meat]));
        assert!(!plate.matches(&[FoodKind::Noodles]));
        assert!(!plate.matches(&[FoodKind::Noodles, FoodKind::Egg]));
    }

    #[test]
    fn test_item_wire_format() {
        let json = r#"{"type":"Food","food_name":"MEAT","chopped":true,"cooked_stage":1}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        let food = item.as_food().unwrap();
        assert_eq!(food.kind, FoodKind::Meat);
        assert_eq!(food.stage, CookStage::Cooked);
        assert!(food.chopped);
    }
}
