//! Three-way join listing the partners of a many-to-many relationship.

use relorm_core::{EntityDescriptor, JoinSide, ManyToMany, Result, Value};

use crate::literal::sql_literal;

/// Partners of the anchor row `anchor_id`, listed as rows of `listed`.
///
/// ```text
/// SELECT x.* FROM <first> x, <second> y, <join> z
///   WHERE z.<first>_<k> = x.<k> AND z.<second>_<k> = y.<k> AND y.<k> = <id>
/// ```
///
/// Tables keep their declared order; the aliases follow the listed side,
/// which is always `x`, while the anchor side is `y`. Fails with
/// `InvalidDirection` when `listed` is neither end of `relation`.
pub fn many_to_many_join(
    relation: &ManyToMany,
    anchor_id: &Value,
    listed: &EntityDescriptor,
) -> Result<String> {
    let listed_side = relation.side_of(listed)?;
    let anchor_side = listed_side.other();
    let alias = |side: JoinSide| if side == listed_side { "x" } else { "y" };

    let first = relation.entity(JoinSide::First);
    let second = relation.entity(JoinSide::Second);
    Ok(format!(
        "SELECT x.* FROM {} {}, {} {}, {} z WHERE z.{} = {}.{} AND z.{} = {}.{} AND y.{} = {}",
        first.table(),
        alias(JoinSide::First),
        second.table(),
        alias(JoinSide::Second),
        relation.join_table,
        relation.join_column(JoinSide::First),
        alias(JoinSide::First),
        relation.key(JoinSide::First),
        relation.join_column(JoinSide::Second),
        alias(JoinSide::Second),
        relation.key(JoinSide::Second),
        relation.key(anchor_side),
        sql_literal(anchor_id),
    ))
}
