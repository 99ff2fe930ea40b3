//! Player roster entries.

use manastorm_core::EntityId;

/// A participant in the match, owning one or more characters.
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name.
    pub name: String,
    /// Team label; free-form, chosen at join time.
    pub team: String,
    /// Packed RGB display color.
    pub color: u32,
    /// Owned characters in spawn order.
    pub characters: Vec<EntityId>,
    /// Index into `characters` of the one that acts on this player's turns.
    pub active: usize,
    /// Index into the spell table, if a spell is selected.
    pub selected_spell: Option<usize>,
    /// Mana pool, spent by future consumable-driven effects and refilled by
    /// potions.
    pub mana: f64,
}

impl Player {
    /// Create a player with no characters yet.
    pub fn new(name: impl Into<String>, team: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
            color,
            characters: Vec::new(),
            active: 0,
            selected_spell: None,
            mana: 100.0,
        }
    }

    /// The character currently holding this player's turn slot.
    pub fn active_character(&self) -> Option<EntityId> {
        self.characters.get(self.active).copied()
    }

    /// Drop a dead character from the roster, keeping the active index on
    /// the same survivor where possible.
    pub fn remove_character(&mut self, id: EntityId) {
        if let Some(pos) = self.characters.iter().position(|c| *c == id) {
            self.characters.remove(pos);
            if pos < self.active && self.active > 0 {
                self.active -= 1;
            }
            if self.active >= self.characters.len() {
                self.active = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_before_active_keeps_the_same_survivor() {
        let mut player = Player::new("morgana", "red", 0xff0000);
        player.characters = vec![10, 11, 12];
        player.active = 2;

        player.remove_character(10);
        assert_eq!(player.active_character(), Some(12));

        player.remove_character(12);
        assert_eq!(player.active_character(), Some(11));
    }
}
