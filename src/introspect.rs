use indexmap::IndexMap;

use crate::ty::{ObjectDesc, Ty};

/// All fields of `desc`, its own and every ancestor's, keyed by name.
///
/// Types are merged in linearized order: `desc` first, and every ancestor
/// only after all of its subclasses in the hierarchy. The first declaration
/// of a name wins, so the most specific declaration shadows the inherited
/// ones even when a shared base is reachable through an earlier parent.
pub fn fields(desc: &ObjectDesc) -> IndexMap<String, Ty> {
    let mut out = IndexMap::new();
    for ty in linearize(desc) {
        for field in &ty.fields {
            out.entry(field.name.clone()).or_insert_with(|| field.ty.clone());
        }
    }
    out
}

/// `desc` and its ancestors, each listed after every subclass of it.
///
/// Ties go to depth-first discovery order, so a plain chain walks up the
/// parents and siblings keep their declaration order.
fn linearize(desc: &ObjectDesc) -> Vec<&ObjectDesc> {
    // name -> (type, subclasses not yet emitted)
    let mut found: IndexMap<&str, (&ObjectDesc, usize)> = IndexMap::new();
    found.insert(desc.name.as_str(), (desc, 0));
    discover(desc, &mut found);

    let mut order = Vec::with_capacity(found.len());
    let mut emitted = vec![false; found.len()];
    while let Some(index) = (0..found.len()).find(|&i| !emitted[i] && found[i].1 == 0) {
        emitted[index] = true;
        let ty = found[index].0;
        order.push(ty);
        for parent in &ty.parents {
            if let Some((_, pending)) = found.get_mut(parent.name.as_str()) {
                *pending = pending.saturating_sub(1);
            }
        }
    }
    // Only reachable with an inheritance cycle; keep whatever is left in discovery order.
    order.extend((0..found.len()).filter(|&i| !emitted[i]).map(|i| found[i].0));
    order
}

fn discover<'a>(desc: &'a ObjectDesc, found: &mut IndexMap<&'a str, (&'a ObjectDesc, usize)>) {
    for parent in &desc.parents {
        let first_visit = !found.contains_key(parent.name.as_str());
        found.entry(parent.name.as_str()).or_insert((parent.as_ref(), 0)).1 += 1;
        if first_visit {
            discover(parent, found);
        }
    }
}
