use crate::domain::model::{CarrierPackage, LineItem, Package, PackageDefaults};

/// 毫米轉公分，剛好一半時取偶數（15 mm → 2 cm，25 mm → 2 cm），最小為 1
fn mm_to_cm(mm: u32) -> u32 {
    let whole = mm / 10;
    let rest = mm % 10;
    let rounded = if rest > 5 || (rest == 5 && whole % 2 == 1) {
        whole + 1
    } else {
        whole
    };
    rounded.max(1)
}

pub fn to_carrier_units(package: &Package) -> CarrierPackage {
    CarrierPackage {
        weight: package.weight_g.max(1),
        length: mm_to_cm(package.length_mm),
        width: mm_to_cm(package.width_mm),
        height: mm_to_cm(package.height_mm),
    }
}

pub fn to_carrier_units_all(packages: &[Package]) -> Vec<CarrierPackage> {
    packages.iter().map(to_carrier_units).collect()
}

/// 每件商品一個貨件位置；數量 N 的商品產生 N 個相同的位置
pub fn packages_from_items(items: &[LineItem], defaults: &PackageDefaults) -> Vec<Package> {
    items
        .iter()
        .flat_map(|item| {
            let package = defaults.package_for(&item.dimensions);
            std::iter::repeat(package).take(item.quantity as usize)
        })
        .collect()
}
