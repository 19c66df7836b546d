use crate::entities::identity::CreatureId;
use crate::telemetry::logging::{log_error, log_game};
use crate::world::arena::ItemHandle;
use crate::world::cylinder::{Cylinder, CylinderId, MailboxCylinder};
use crate::world::notify::WorldEvent;
use crate::world::state::WorldState;

impl WorldState {
    /// Delivers everything waiting in a mailbox. Letters go to the depot of
    /// the online player named on their first line; anything undeliverable
    /// is dropped on the mailbox's own tile.
    pub(crate) fn flush_mailbox(&mut self, mailbox: ItemHandle) {
        for letter in MailboxCylinder(mailbox).outbox(self) {
            match self.deliver(letter) {
                Ok(recipient) => {
                    log_game(&format!(
                        "mail {:?} delivered to {:?}",
                        letter, recipient
                    ));
                    self.notify(WorldEvent::MailDelivered {
                        item: letter,
                        recipient,
                    });
                }
                Err(reason) => {
                    log_error(&format!("mail {:?} not delivered: {}", letter, reason));
                    self.return_to_sender(mailbox, letter);
                }
            }
        }
    }

    fn deliver(&mut self, letter: ItemHandle) -> Result<CreatureId, String> {
        let entry = self
            .items
            .get(letter)
            .ok_or_else(|| "letter vanished".to_string())?;
        let name = entry.text().lines().next().unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err("no recipient".to_string());
        }
        let stamped = entry.item_type.stamped;
        let recipient = self
            .registry
            .player_by_name(&name)
            .ok_or_else(|| format!("recipient {} is not online", name))?;
        let depot = self
            .registry
            .player(recipient)
            .and_then(|player| player.depot)
            .filter(|depot| self.items.contains(*depot))
            .ok_or_else(|| format!("recipient {} has no depot", name))?;
        if !self.relocate(letter, CylinderId::Container(depot)) {
            return Err(format!("depot of {} refused the letter", name));
        }
        if let Some(stamped) = stamped {
            self.transform_item(letter, stamped, None)
                .map_err(|err| format!("stamping failed: {}", err))?;
        }
        Ok(recipient)
    }

    fn return_to_sender(&mut self, mailbox: ItemHandle, letter: ItemHandle) {
        let tile = self
            .items
            .get(mailbox)
            .and_then(|entry| entry.parent)
            .filter(|parent| matches!(parent, CylinderId::Tile(_)));
        let returned = tile.is_some_and(|tile| self.relocate(letter, tile));
        if !returned {
            log_error(&format!("mail {:?} had nowhere to go and was destroyed", letter));
            CylinderId::Mailbox(mailbox).remove_thing(self, letter, 1);
            self.release_item(letter);
        }
    }
}
